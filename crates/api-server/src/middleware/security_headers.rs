// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Security response headers
//!
//! A fixed header set is built once from configuration and copied onto every
//! response. The content security policy admits inline scripts and styles so
//! that the Swagger UI served under `/api-docs` keeps working.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityHeadersConfig;

const CONTENT_SECURITY_POLICY_DIRECTIVES: &[&str] = &[
    "default-src 'self'",
    "base-uri 'self'",
    "font-src 'self' https: data:",
    "form-action 'self'",
    "frame-ancestors 'self'",
    "img-src 'self' data: https:",
    "object-src 'none'",
    "script-src 'self' 'unsafe-inline'",
    "script-src-attr 'none'",
    "style-src 'self' 'unsafe-inline'",
    "connect-src 'self'",
    "media-src 'self'",
    "frame-src 'self'",
    "upgrade-insecure-requests",
];

const STRICT_TRANSPORT_SECURITY_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "cross-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Precomputed security header set
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: HeaderMap,
}

impl SecurityHeaders {
    /// Build the header set for the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a header name or value is malformed.
    pub fn new(config: SecurityHeadersConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_str(&CONTENT_SECURITY_POLICY_DIRECTIVES.join("; "))?,
        );

        if config.hsts_enabled {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(STRICT_TRANSPORT_SECURITY_VALUE),
            );
        }

        for &(name, value) in STATIC_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        Ok(Self { headers })
    }

    /// Copy the header set onto `headers`, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    /// The configured headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Security headers middleware function
pub async fn security_headers_middleware(
    State(security_headers): State<Arc<SecurityHeaders>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    security_headers.apply(response.headers_mut());
    response
}
