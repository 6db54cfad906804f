// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! This module provides shared application state for the API server: the
//! immutable configuration and the token used for coordinated cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration, read once at startup
    config: Arc<ServerConfig>,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `cancellation_token` - Token for coordinated cancellation
    pub fn new(config: ServerConfig, cancellation_token: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared handle to the server configuration
    pub fn shared_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }
}
