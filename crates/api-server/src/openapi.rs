// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` documentation module
//!
//! This module provides the `OpenAPI` JSON and `Swagger UI` endpoints for API documentation.
//!
//! The page title stays the bundled `Swagger UI` one and no custom stylesheet is
//! injected; `utoipa-swagger-ui` exposes neither. The top bar is dropped by
//! switching to the base layout instead.

use utoipa::openapi::OpenApi;
use utoipa_swagger_ui::{Config, SwaggerUi, SyntaxHighlight};

/// Mount point of the interactive documentation
pub const DOCS_PATH: &str = "/api-docs";

/// Path of the raw `OpenAPI` document
pub const OPENAPI_JSON_PATH: &str = "/api-docs.json";

const SYNTAX_THEME: &str = "monokai";

/// Swagger UI and `OpenAPI` JSON routes for the given document
pub fn docs_routes(openapi: OpenApi) -> SwaggerUi {
    let config = Config::default()
        .use_base_layout()
        .filter(true)
        .deep_linking(true)
        .display_request_duration(true)
        .persist_authorization(true)
        .try_it_out_enabled(true)
        .doc_expansion("none")
        .default_models_expand_depth(2)
        .default_model_expand_depth(2)
        .with_syntax_highlight(SyntaxHighlight::from(true).theme(SYNTAX_THEME));

    SwaggerUi::new(DOCS_PATH)
        .url(OPENAPI_JSON_PATH, openapi)
        .config(config)
}
