// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the public HTTP surface

mod fixtures;

use api_server::{Environment, ServerConfig, config::CorsConfig};
use axum::http::{StatusCode, header};
use chrono::{DateTime, SecondsFormat, Utc};
use fixtures::{config_for, spawn_server};
use serde_json::{Value, json};

#[tokio::test]
async fn root_returns_welcome_payload() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(
        body,
        json!({
            "status": "success",
            "message": "Welcome to Axum REST API",
            "documentation": "/api-docs"
        })
    );
}

#[tokio::test]
async fn health_returns_round_trippable_timestamp() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(body["status"], "ok");

    let timestamp = body["timestamp"].as_str().expect("timestamp is a string");
    let parsed = DateTime::parse_from_rfc3339(timestamp).expect("timestamp is ISO-8601");
    assert_eq!(
        parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        timestamp
    );
}

#[tokio::test]
async fn unknown_route_returns_not_found() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/does-not-exist"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(
        body,
        json!({
            "status": "error",
            "message": "Route GET /does-not-exist not found"
        })
    );
}

#[tokio::test]
async fn unregistered_method_returns_not_found() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/health"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request");
    let headers = response.headers();

    let csp = headers[header::CONTENT_SECURITY_POLICY]
        .to_str()
        .expect("CSP is ASCII");
    assert!(csp.contains("default-src 'self'"));
    assert!(csp.contains("script-src 'self' 'unsafe-inline'"));
    assert_eq!(
        headers[header::STRICT_TRANSPORT_SECURITY],
        "max-age=31536000; includeSubDomains; preload"
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn not_found_responses_carry_security_headers() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/missing"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/health"))
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let allowed_methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .expect("methods are ASCII");
    assert!(allowed_methods.contains("PATCH"));
}

#[tokio::test]
async fn cors_allow_list_omits_headers_for_other_origins() {
    let config = ServerConfig {
        cors: CorsConfig {
            origins: "https://app.example.com"
                .parse()
                .expect("valid origin list"),
        },
        ..ServerConfig::for_testing()
    };
    let (addr, _) = spawn_server(config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/health"))
        .header(header::ORIGIN, "https://app.example.com")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );

    let response = client
        .get(format!("http://{addr}/health"))
        .header(header::ORIGIN, "https://other.example.com")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn api_group_is_served_under_prefix() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/api/v1"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(body["status"], "success");
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn openapi_document_reflects_configuration() {
    let mut config = config_for(Environment::Development);
    config.api_url = "https://api.example.com".parse().expect("valid URL");
    config.support_email = "help@example.com".to_string();
    let (addr, _) = spawn_server(config).await;

    let response = reqwest::get(format!("http://{addr}/api-docs.json"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let document: Value = response.json().await.expect("Failed to parse body");
    assert_eq!(document["openapi"], "3.1.0");
    assert_eq!(document["info"]["contact"]["name"], "API Support");
    assert_eq!(document["info"]["contact"]["email"], "help@example.com");
    assert_eq!(document["servers"][0]["url"], "https://api.example.com");
    assert_eq!(document["servers"][0]["description"], "Development server");
    assert_eq!(
        document["components"]["securitySchemes"]["bearerAuth"]["scheme"],
        "bearer"
    );
    assert_eq!(
        document["components"]["securitySchemes"]["bearerAuth"]["bearerFormat"],
        "JWT"
    );
    assert!(document["paths"]["/health"]["get"].is_object());
    assert!(document["paths"]["/api/v1"]["get"].is_object());
}

#[tokio::test]
async fn swagger_ui_is_served() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/api-docs/"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let html = response.text().await.expect("Failed to read body");
    assert!(html.contains("swagger-ui"));
}

#[tokio::test]
async fn metrics_are_exported() {
    let (addr, _) = spawn_server(ServerConfig::for_testing()).await;

    reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request");

    let response = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let text = response.text().await.expect("Failed to read body");
    assert!(text.contains("api_server_http_requests_total"));
}

#[tokio::test]
async fn cancelled_server_stops_accepting_requests() {
    let (addr, token) = spawn_server(ServerConfig::for_testing()).await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    token.cancel();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .expect("Failed to build client");
    assert!(client.get(format!("http://{addr}/health")).send().await.is_err());
}
