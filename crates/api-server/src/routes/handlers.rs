// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! This module provides the top-level handlers of the API server: the root
//! welcome payload, the health check and the not-found fallback.

use axum::{
    Json,
    http::{Method, Uri},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    docs::API_TITLE,
    error::{ErrorResponse, ServerError},
    openapi::DOCS_PATH,
};

/// Welcome payload returned by the root endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RootResponse {
    /// Always `success`
    #[schema(example = "success")]
    pub status: String,
    /// Welcome message naming the API
    #[schema(example = "Welcome to Axum REST API")]
    pub message: String,
    /// Path of the interactive documentation
    #[schema(example = "/api-docs")]
    pub documentation: String,
}

/// Root endpoint handler
#[utoipa::path(
    get,
    path = "/",
    operation_id = "getRoot",
    tag = "Root",
    summary = "Root endpoint",
    description = "Returns welcome message and API documentation link",
    responses(
        (status = 200, description = "Welcome message", body = RootResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    )
)]
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        status: "success".to_string(),
        message: format!("Welcome to {API_TITLE}"),
        documentation: DOCS_PATH.to_string(),
    })
}

/// Health check payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HealthResponse {
    /// Always `ok`
    #[schema(example = "ok")]
    pub status: String,
    /// Current time in UTC with millisecond precision
    #[schema(format = DateTime, example = "2024-03-14T12:00:00.000Z")]
    pub timestamp: String,
}

impl HealthResponse {
    /// Health payload stamped with the current time
    pub fn now() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Health check endpoint handler
#[utoipa::path(
    get,
    path = "/health",
    operation_id = "getHealthStatus",
    tag = "Health",
    summary = "Health check endpoint",
    description = "Returns the health status of the API",
    responses(
        (status = 200, description = "API is healthy", body = HealthResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    )
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::now())
}

/// Fallback for unmatched routes and unregistered methods on known routes
pub async fn not_found_handler(method: Method, uri: Uri) -> ServerError {
    ServerError::NotFound {
        method,
        path: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string),
    }
}
