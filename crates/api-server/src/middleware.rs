// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Middleware module for HTTP request processing
//!
//! This module provides the pipeline stages shared by every route: request
//! logging, request validation, CORS, security headers, rate limiting and the
//! terminal error handler.
//!
//! Stages run in this order, outermost first:
//!
//! 1. [`error_handler`] observes internal failures and renders them
//! 2. request id and tracing (`tower-http`)
//! 3. [`cors_layer`] and the request timeout
//! 4. request metrics and [`request_logger`]
//! 5. [`security_headers::security_headers_middleware`]
//! 6. [`rate_limit::rate_limiting_middleware`]
//! 7. [`validate_request`]
//! 8. panic recovery through [`panic_response`], directly around the handlers

pub mod rate_limit;
pub mod security_headers;

use std::{any::Any, time::Duration};

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderName, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

pub use rate_limit::{RateLimitDecision, RateLimiter, rate_limiting_middleware};
pub use security_headers::{SecurityHeaders, security_headers_middleware};

use crate::{
    config::{CorsConfig, CorsOrigins, Environment},
    error::{ErrorDetail, ErrorResponse, ServerError},
    metrics,
};

const CORS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Log every incoming request before it is dispatched
pub async fn request_logger(req: Request, next: Next) -> Response {
    info!(
        timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        method = %req.method(),
        uri = %req.uri(),
        "incoming request"
    );
    next.run(req).await
}

/// Request validation stage
///
/// No request schema is enforced yet; every request is forwarded unchanged.
pub async fn validate_request(req: Request, next: Next) -> Response {
    next.run(req).await
}

/// Terminal error handler
///
/// Internal failures carry an [`ErrorDetail`] extension. The detail is logged
/// here and, outside production, replaces the generic message in the body.
pub async fn error_handler(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let mut response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    error!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        error = %detail,
        "request failed"
    );
    metrics::record_internal_error();

    if environment.is_production() {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let mut rendered = (parts.status, Json(ErrorResponse::new(detail.to_string()))).into_response();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    rendered.headers_mut().extend(parts.headers);
    rendered
}

/// Convert a handler panic into an internal error response
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    ServerError::internal(message).into_response()
}

/// Build the CORS layer for the configured origins
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = match &config.origins {
        CorsOrigins::Any => AllowOrigin::any(),
        CorsOrigins::List(origins) => AllowOrigin::list(origins.iter().cloned()),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, REQUEST_ID_HEADER])
        .expose_headers([
            rate_limit::RATELIMIT_POLICY,
            rate_limit::RATELIMIT_LIMIT,
            rate_limit::RATELIMIT_REMAINING,
            rate_limit::RATELIMIT_RESET,
            header::RETRY_AFTER,
            REQUEST_ID_HEADER,
        ])
        .max_age(CORS_MAX_AGE)
}
