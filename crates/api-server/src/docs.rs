// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` document generation
//!
//! Static metadata comes from the handler annotations collected by [`ApiDoc`];
//! [`build_openapi`] merges in the values that depend on the running
//! configuration (server URL, environment, support contact and API prefix).

use utoipa::{
    Modify, OpenApi,
    openapi::{
        ContactBuilder, LicenseBuilder, ServerBuilder,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

use crate::{
    config::ServerConfig,
    error::ErrorResponse,
    routes::{
        api::{self as api_group, ApiIndexResponse},
        handlers::{self, HealthResponse, RootResponse},
    },
};

/// Human-facing name of the API
pub const API_TITLE: &str = "Axum REST API";

/// Name of the bearer security scheme declared in the document
pub const BEARER_AUTH_SCHEME: &str = "bearerAuth";

const LICENSE_NAME: &str = "Apache-2.0";
const LICENSE_URL: &str = "https://www.apache.org/licenses/LICENSE-2.0";
const SUPPORT_CONTACT_NAME: &str = "API Support";

/// Documented top-level routes
#[derive(OpenApi)]
#[openapi(
    paths(handlers::root_handler, handlers::health_handler),
    components(schemas(RootResponse, HealthResponse, ErrorResponse)),
    modifiers(&SecurityAddon),
    security(("bearerAuth" = [])),
    tags(
        (name = "Root", description = "Service entry point"),
        (name = "Health", description = "Liveness checks"),
        (name = "API", description = "Versioned API route group")
    )
)]
pub struct ApiDoc;

/// Documented routes of the default API group, relative to the API prefix
#[derive(OpenApi)]
#[openapi(
    paths(api_group::api_index_handler),
    components(schemas(ApiIndexResponse))
)]
pub struct ApiGroupDoc;

/// Declares the bearer token scheme; tokens are documented but not enforced
#[derive(Debug)]
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            BEARER_AUTH_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the `OpenAPI` document for the given configuration
pub fn build_openapi(config: &ServerConfig) -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi().nest_with_path_composer(
        config.api_prefix.as_str(),
        ApiGroupDoc::openapi(),
        |prefix, path| {
            if path == "/" {
                prefix.to_string()
            } else {
                format!("{prefix}{path}")
            }
        },
    );

    openapi.info.title = API_TITLE.to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description = Some(format!(
        "API documentation for {API_TITLE} ({} environment)",
        config.environment
    ));
    openapi.info.contact = Some(
        ContactBuilder::new()
            .name(Some(SUPPORT_CONTACT_NAME))
            .email(Some(config.support_email.as_str()))
            .build(),
    );
    openapi.info.license = Some(
        LicenseBuilder::new()
            .name(LICENSE_NAME)
            .url(Some(LICENSE_URL))
            .build(),
    );
    openapi.servers = Some(vec![
        ServerBuilder::new()
            .url(config.api_url.as_str().trim_end_matches('/'))
            .description(Some(format!("{} server", config.environment.label())))
            .build(),
    ]);

    openapi
}
