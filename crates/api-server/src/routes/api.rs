// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Default API route group
//!
//! Mounted under the configured API prefix. Applications replace it with their
//! own group through [`crate::Server::with_api_routes`].

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{config::Environment, docs::API_TITLE, error::ErrorResponse, state::ServerState};

/// Summary of the API group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ApiIndexResponse {
    /// Always `success`
    #[schema(example = "success")]
    pub status: String,
    /// API name
    #[schema(example = "Axum REST API")]
    pub name: String,
    /// Package version
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Runtime environment
    pub environment: Environment,
}

/// API group index handler
#[utoipa::path(
    get,
    path = "/",
    operation_id = "getApiIndex",
    tag = "API",
    summary = "API index",
    description = "Returns the API name, version and runtime environment",
    responses(
        (status = 200, description = "API summary", body = ApiIndexResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    )
)]
pub async fn api_index_handler(State(state): State<ServerState>) -> Json<ApiIndexResponse> {
    Json(ApiIndexResponse {
        status: "success".to_string(),
        name: API_TITLE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config().environment,
    })
}

/// Default API route group
pub fn api_routes() -> Router<ServerState> {
    Router::new().route("/", get(api_index_handler))
}
