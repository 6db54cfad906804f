// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! This module provides route configuration and handlers for the API server.

pub mod api;
pub mod handlers;

use axum::{Router, routing::get};
use handlers::{health_handler, not_found_handler, root_handler};
use utoipa::openapi::OpenApi;

use crate::{config::ApiPrefix, metrics::metrics_handler, openapi::docs_routes, state::ServerState};

/// Create application routes
///
/// The API group is nested under `api_prefix`; anything unmatched, including a
/// known path requested with an unregistered method, falls through to the
/// not-found handler.
pub fn create_routes(
    api_prefix: &ApiPrefix,
    api_routes: Router<ServerState>,
    openapi: OpenApi,
) -> Router<ServerState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest(api_prefix.as_str(), api_routes)
        .merge(docs_routes(openapi))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
}
