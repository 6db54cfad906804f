// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the integration tests
//!
//! Servers are bound to an ephemeral localhost port and stopped through the
//! returned cancellation token.

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use api_server::{
    Environment, Server, ServerConfig, ServerError, ShutdownConfig, config::RateLimitingConfig,
    state::ServerState,
};
use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;

/// Detail carried by the failing fixture route
pub const FAILURE_DETAIL: &str = "database connection refused";

/// Test configuration running as `environment`, without rate limiting
pub fn config_for(environment: Environment) -> ServerConfig {
    ServerConfig {
        environment,
        ..ServerConfig::for_testing()
    }
}

/// Test configuration running as `environment` with an active limiter
pub fn rate_limited_config(environment: Environment, max_requests: u32) -> ServerConfig {
    ServerConfig {
        rate_limiting: RateLimitingConfig {
            enabled: true,
            max_requests,
            window: Duration::from_secs(900),
            trust_proxy: false,
        },
        ..config_for(environment)
    }
}

/// Start a server with the default API group
pub async fn spawn_server(config: ServerConfig) -> (SocketAddr, CancellationToken) {
    Server::new(config, ShutdownConfig::default())
        .expect("Failed to create server")
        .run_for_testing()
        .await
        .expect("Failed to start test server")
}

/// Start a server whose API group contains failing routes
pub async fn spawn_failing_server(config: ServerConfig) -> (SocketAddr, CancellationToken) {
    Server::with_api_routes(config, ShutdownConfig::default(), failing_routes())
        .expect("Failed to create server")
        .run_for_testing()
        .await
        .expect("Failed to start test server")
}

async fn failing_handler() -> Result<&'static str, ServerError> {
    Err(ServerError::internal(FAILURE_DETAIL))
}

#[allow(clippy::panic)]
async fn panicking_handler() -> &'static str {
    panic!("handler invariant violated")
}

fn failing_routes() -> Router<ServerState> {
    Router::new()
        .route("/fail", get(failing_handler))
        .route("/panic", get(panicking_handler))
}
