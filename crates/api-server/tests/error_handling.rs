// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the terminal error handler

mod fixtures;

use api_server::Environment;
use axum::http::{StatusCode, header};
use fixtures::{FAILURE_DETAIL, config_for, spawn_failing_server};
use serde_json::{Value, json};

async fn get_json(url: String) -> (StatusCode, Value) {
    let response = reqwest::get(url).await.expect("Failed to send request");
    let status = response.status();
    assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
    let body = response.json().await.expect("Failed to parse body");
    (status, body)
}

#[tokio::test]
async fn production_hides_failure_detail() {
    let (addr, _) = spawn_failing_server(config_for(Environment::Production)).await;

    let (status, body) = get_json(format!("http://{addr}/api/v1/fail")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "status": "error", "message": "Something went wrong!" })
    );
}

#[tokio::test]
async fn development_exposes_failure_detail() {
    let (addr, _) = spawn_failing_server(config_for(Environment::Development)).await;

    let (status, body) = get_json(format!("http://{addr}/api/v1/fail")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "status": "error", "message": FAILURE_DETAIL }));
}

#[tokio::test]
async fn panics_become_internal_errors() {
    let (addr, _) = spawn_failing_server(config_for(Environment::Production)).await;

    let (status, body) = get_json(format!("http://{addr}/api/v1/panic")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong!");

    // The server keeps serving after a handler panic
    let (status, _) = get_json(format!("http://{addr}/api/v1/fail")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn panic_detail_is_exposed_outside_production() {
    let (addr, _) = spawn_failing_server(config_for(Environment::Test)).await;

    let (status, body) = get_json(format!("http://{addr}/api/v1/panic")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "handler invariant violated");
}

#[tokio::test]
async fn custom_api_group_replaces_default_index() {
    let (addr, _) = spawn_failing_server(config_for(Environment::Test)).await;

    let (status, body) = get_json(format!("http://{addr}/api/v1")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route GET /api/v1 not found");
}
