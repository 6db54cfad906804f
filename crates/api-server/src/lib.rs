// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! API Server Implementation
//!
//! This crate provides a boilerplate HTTP API server built with Axum: a root
//! endpoint, a health check, a pluggable versioned API route group and generated
//! `OpenAPI` documentation, behind a production-ready middleware pipeline.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types and HTTP response handling with proper status codes
//! - [`state`]: Shared application state management with cancellation token support
//! - [`server`]: Main server implementation, lifecycle, and coordinated shutdown
//! - [`routes`]: Route configuration and HTTP request handlers
//! - [`middleware`]: Rate limiting, security headers, CORS, request logging and error handling
//! - [`docs`]: `OpenAPI` document generation from handler annotations and configuration
//! - [`openapi`]: `OpenAPI` JSON and Swagger UI endpoints
//! - [`metrics`]: Prometheus request metrics
//!
//! # Key Features
//!
//! - **Graceful Shutdown**: Coordinated termination using `CancellationToken` with timeouts
//! - **Rate Limiting**: Per-client fixed window limiting with standard `RateLimit-*` headers
//! - **Security Headers**: Content security policy, HSTS and companion headers on every response
//! - **Error Handling**: Internal failure detail is logged and withheld from clients in production

pub mod config;
pub mod docs;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ErrorResponse, ServerError, ServerResult};
pub use server::{Server, ShutdownConfig};
pub use state::ServerState;
