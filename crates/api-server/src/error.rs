// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! This module provides error types for server operations, including the HTTP
//! response mapping used by handlers and middleware.
//!
//! Internal failures (5xx) are rendered with a generic message and carry an
//! [`ErrorDetail`] response extension. The terminal error handler in
//! [`crate::middleware`] logs that detail and decides whether it is exposed to
//! the client.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Message returned for internal failures when the detail is withheld
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Message returned when a client exceeds its rate limit
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Errors for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },

    /// Timeout errors for operations that exceed time limits
    #[error("Operation timed out after {timeout_seconds} seconds")]
    Timeout {
        /// Timeout duration in seconds
        timeout_seconds: u64,
    },

    /// No route matched the request
    #[error("Route {method} {path} not found")]
    NotFound {
        /// Request method
        method: Method,
        /// Request path
        path: String,
    },

    /// Client exceeded its request budget for the current window
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited {
        /// Time until the client's window resets
        retry_after: Duration,
    },

    /// Failure raised while handling a request
    #[error("{message}")]
    Internal {
        /// Error detail; only exposed outside production
        message: String,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// Create an internal error from any displayable failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Config { .. }
            | Self::Bind { .. }
            | Self::Startup { .. }
            | Self::Shutdown { .. }
            | Self::TaskJoin { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error envelope returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// Always `error`
    #[schema(example = "error")]
    pub status: String,
    /// Human-readable error message
    #[schema(example = "Something went wrong!")]
    pub message: String,
}

impl ErrorResponse {
    /// Create an error envelope with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Detail of an internal failure, attached to the response for the error handler
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub Arc<str>);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            let mut response =
                (status, Json(ErrorResponse::new(GENERIC_ERROR_MESSAGE))).into_response();
            response
                .extensions_mut()
                .insert(ErrorDetail(Arc::from(self.to_string())));
            return response;
        }

        let mut response = (status, Json(ErrorResponse::new(self.to_string()))).into_response();
        if let Self::RateLimited { retry_after } = self {
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Convenient From implementations for common async error types
impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}
