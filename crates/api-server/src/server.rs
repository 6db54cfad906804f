// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the main server struct and implementation for the API server,
//! including server lifecycle management, the middleware pipeline, and coordinated
//! graceful shutdown using `CancellationToken`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::Request,
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, error, info, info_span, warn};

use crate::{
    config::ServerConfig,
    docs::build_openapi,
    error::{ServerError, ServerResult},
    metrics::track_metrics,
    middleware::{
        RateLimiter, SecurityHeaders, cors_layer, error_handler, panic_response,
        rate_limiting_middleware, request_logger, security_headers_middleware, validate_request,
    },
    openapi::DOCS_PATH,
    routes::{api::api_routes, create_routes},
    state::ServerState,
};

// Server constants
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests after shutdown is requested
    pub graceful_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Main server struct
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create new server instance with the default API route group
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the middleware cannot be built from the configuration.
    pub fn new(config: ServerConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        Self::with_api_routes(config, shutdown_config, api_routes())
    }

    /// Create server with a custom API route group nested under the API prefix
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the middleware cannot be built from the configuration.
    pub fn with_api_routes(
        config: ServerConfig,
        shutdown_config: ShutdownConfig,
        api_routes: Router<ServerState>,
    ) -> ServerResult<Self> {
        let cancellation_token = CancellationToken::new();
        let state = ServerState::new(config, cancellation_token.child_token());
        let router = Self::create_router(state.clone(), api_routes)?;

        Ok(Self {
            config: state.shared_config(),
            router,
            state,
            cancellation_token,
            shutdown_config,
        })
    }

    /// Create application router with the middleware pipeline
    fn create_router(state: ServerState, api_routes: Router<ServerState>) -> ServerResult<Router> {
        let config = state.config();
        let openapi = build_openapi(config);

        let rate_limiter = RateLimiter::new(config.rate_limiting.clone());
        let security_headers = Arc::new(
            SecurityHeaders::new(config.security_headers).map_err(|e| ServerError::Config {
                message: format!("invalid security headers: {e}"),
            })?,
        );

        // Layers listed outermost first
        let middleware = ServiceBuilder::new()
            .layer(from_fn_with_state(config.environment, error_handler))
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request| {
                        if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                            info_span!("http_request", ?request_id)
                        } else {
                            error!("failed to extract id from request");
                            info_span!("http_request", request_id = "unknown")
                        }
                    })
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(cors_layer(&config.cors))
            .layer(TimeoutLayer::new(config.timeout_seconds.value()))
            .layer(from_fn(track_metrics))
            .layer(from_fn(request_logger))
            .layer(from_fn_with_state(
                security_headers,
                security_headers_middleware,
            ))
            .layer(from_fn_with_state(rate_limiter, rate_limiting_middleware))
            .layer(from_fn(validate_request))
            .layer(CatchPanicLayer::custom(panic_response));

        Ok(create_routes(&config.api_prefix, api_routes, openapi)
            .layer(middleware)
            .with_state(state))
    }

    /// Run the server with coordinated graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// `ServerError::Startup` if the server fails to start, or
    /// `ServerError::Timeout` if in-flight requests outlive the graceful timeout.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %actual_addr,
            port = actual_addr.port(),
            api_prefix = %self.config.api_prefix,
            environment = %self.config.environment,
            "API server starting",
        );
        info!(
            "API documentation available at http://localhost:{}{}",
            actual_addr.port(),
            DOCS_PATH
        );

        let router = self.router;
        let graceful_timeout = self.shutdown_config.graceful_timeout;
        let cancellation_token = self.cancellation_token.clone();
        let shutdown_token = cancellation_token.clone();
        tokio::spawn(async move {
            info!("spawning the graceful shutdown task");
            Self::shutdown_signal_handler(shutdown_token).await;
        });

        let serve_token = cancellation_token.clone();
        let mut serve_task = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                serve_token.cancelled().await;
            })
            .await
        });

        let server_result = tokio::select! {
            result = &mut serve_task => result?,
            () = cancellation_token.cancelled() => {
                if let Ok(result) = tokio::time::timeout(graceful_timeout, &mut serve_task).await {
                    result?
                } else {
                    warn!(
                        timeout_seconds = graceful_timeout.as_secs(),
                        "graceful shutdown timed out, aborting in-flight requests"
                    );
                    serve_task.abort();
                    return Err(ServerError::Timeout {
                        timeout_seconds: graceful_timeout.as_secs(),
                    });
                }
            }
        };

        if let Err(e) = server_result {
            error!(error = ?e, "Server error during shutdown");
            Err(ServerError::Shutdown { source: e })
        } else {
            info!("API server shut down gracefully");
            Ok(())
        }
    }

    /// Handle shutdown signals and trigger coordinated cancellation
    ///
    /// This function listens for SIGINT (Ctrl+C) and SIGTERM signals,
    /// and cancels the provided cancellation token when received.
    async fn shutdown_signal_handler(cancellation_token: CancellationToken) {
        let signal_received = async {
            #[cfg(unix)]
            #[allow(clippy::expect_used)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM signal, initiating coordinated shutdown");
                        "SIGTERM"
                    },
                    _ = sigint.recv() => {
                        warn!("Received SIGINT signal, initiating coordinated shutdown");
                        "SIGINT"
                    },
                }
            }

            #[cfg(not(unix))]
            #[allow(clippy::expect_used)]
            {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install CTRL+C signal handler");
                warn!("Received CTRL+C signal, initiating coordinated shutdown");
                "CTRL+C"
            }
        };

        // Wait for either a signal or existing cancellation
        tokio::select! {
            signal_name = signal_received => {
                warn!("Shutdown signal {} received, cancelling all operations...", signal_name);
                cancellation_token.cancel();
            },
            () = cancellation_token.cancelled() => {
                warn!("Cancellation token already cancelled, shutdown signal handler exiting");
            }
        }
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Run server for testing, returns the bound address
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, CancellationToken)> {
        let addr = self.config.socket_addr();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        let token = self.cancellation_token.child_token();
        let task = token.child_token();
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                self.router
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { task.cancelled().await })
            .await;
        });

        Ok((actual_addr, token))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Clone of the fully layered router, for in-process requests
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
