// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! API Server
//!
//! Boilerplate HTTP API service with health checks, security middleware and
//! `OpenAPI` documentation.

use anyhow::Result;
use api_server::{Environment, Server, ServerConfig, ShutdownConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(environment: Environment) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // JSON in production, human-readable elsewhere
    let (json_layer, pretty_layer) = if environment.is_production() {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    init_tracing(config.environment);

    if config.environment.is_test() {
        info!(
            environment = %config.environment,
            "test environment detected, not starting the listener"
        );
        return Ok(());
    }

    info!(
        port = config.port.value(),
        api_prefix = %config.api_prefix,
        environment = %config.environment,
        "starting API server with coordinated shutdown support"
    );

    let server = Server::new(config, ShutdownConfig::default())?;

    // NOTE: the `#[tokio::main]` task does not run a worker future, we must spawn
    tokio::spawn(async move { server.run().await }).await??;

    Ok(())
}
