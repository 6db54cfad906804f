// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros and
//! an Axum-compatible metrics handler.

use std::{sync::LazyLock, time::Instant};

use axum::{
    extract::{MatchedPath, Request},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter, register_int_counter_vec,
};

use crate::error::ServerError;

const UNMATCHED_ROUTE_LABEL: &str = "unmatched";

/// Total number of HTTP requests served, labeled by method, route and status.
pub static HTTP_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "api_server_http_requests_total",
        "Total number of HTTP requests, labeled by method, route and status",
        &["method", "route", "status"]
    )
    .expect("Failed to create api_server_http_requests_total counter vec")
});

/// Histogram for HTTP request durations in seconds.
pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "api_server_http_request_duration_seconds",
        "HTTP request durations in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to create HTTP request duration histogram")
});

/// Requests rejected by the rate limiter
pub static RATE_LIMITED_REQUESTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "api_server_rate_limited_requests_total",
        "Total number of requests rejected by the rate limiter"
    )
    .expect("Failed to create rate limited requests counter")
});

/// Internal failures observed by the error handler
pub static INTERNAL_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "api_server_internal_errors_total",
        "Total number of requests that ended in an internal failure"
    )
    .expect("Failed to create internal errors counter")
});

/// Record a completed request
///
/// # Arguments
/// * `method` - The request method
/// * `route` - The matched route template, or `unmatched`
/// * `status` - The response status
/// * `duration_secs` - The time taken to produce the response in seconds
pub fn record_request(method: &str, route: &str, status: StatusCode, duration_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[method, route, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, route])
        .observe(duration_secs);
}

/// Increment the rate limited requests counter
pub fn record_rate_limited() {
    RATE_LIMITED_REQUESTS.inc();
}

/// Increment the internal errors counter
pub fn record_internal_error() {
    INTERNAL_ERRORS.inc();
}

/// Middleware recording request count and latency per matched route
///
/// Route templates are used as labels so that arbitrary request paths do not
/// create unbounded label sets.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE_LABEL, MatchedPath::as_str)
        .to_string();

    let response = next.run(req).await;

    record_request(
        &method,
        &route,
        response.status(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Axum handler that exports metrics in Prometheus text format
///
/// # Errors
///
/// Returns `ServerError::Internal` if the metrics cannot be encoded.
pub async fn metrics_handler() -> Result<Response, ServerError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ServerError::internal(format!("failed to encode metrics: {e}")))?;

    let body = String::from_utf8(buffer)
        .map_err(|e| ServerError::internal(format!("metrics are not valid UTF-8: {e}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response())
}
