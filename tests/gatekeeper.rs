//! End-to-end gatekeeper behaviour over real sockets.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use taskhub::security::identity::Role;

mod common;

#[tokio::test]
async fn test_denylisted_address_is_refused_everywhere() {
    let mut config = common::test_config();
    config.gatekeeper.trust_forwarded_for = true;
    let server = common::start_server(config).await;

    for path in ["/health", "/users", "/does-not-exist"] {
        let res = server
            .as_role(Method::GET, path, "admin")
            .header("x-forwarded-for", "10.0.0.5")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "path {}", path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "IP_BLOCKED");
    }

    let res = server
        .as_role(Method::GET, "/users", "admin")
        .header("x-forwarded-for", "10.0.0.6")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_window() {
    let mut config = common::test_config();
    config.gatekeeper.rate_limit_max_requests = 5;
    config.gatekeeper.rate_limit_window_secs = 1;
    let server = common::start_server(config).await;

    for i in 0..5 {
        let res = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "request {}", i + 1);
    }

    let limited = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retry_after"].as_u64().unwrap() <= 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_role_policies() {
    let server = common::start_server(common::test_config()).await;

    let res = server.as_role(Method::DELETE, "/users/1", "guest").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INSUFFICIENT_PERMISSIONS");
    assert_eq!(body["required_roles"], json!(["admin"]));

    let res = server.as_role(Method::DELETE, "/users/1", "admin").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.client.get(server.url("/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn test_routed_but_unlisted_endpoint_is_not_found() {
    let server = common::start_server(common::test_config()).await;

    for path in ["/projects/1", "/tasks/1"] {
        let res = server.as_role(Method::GET, path, "admin").send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "path {}", path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "ENDPOINT_NOT_FOUND");
    }
}

#[tokio::test]
async fn test_body_fields_are_sanitized_before_handler() {
    let server = common::start_server(common::test_config()).await;

    let res = server
        .as_role(Method::POST, "/projects", "developer")
        .json(&json!({ "name": "  <b>Gemini</b> ", "description": "<i>orbital</i>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let project: Value = res.json().await.unwrap();
    assert_eq!(project["name"], "bGemini/b");
    assert_eq!(project["description"], "iorbital/i");
}

#[tokio::test]
async fn test_token_identity_mode() {
    let mut config = common::test_config();
    config.identity = Default::default();
    let server = common::start_server(config).await;

    let res = server
        .client
        .get(server.url("/users"))
        .bearer_auth(common::token(Some(Role::Tester)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // An asserted header alone is not an identity in token mode.
    let res = server.as_role(Method::GET, "/users", "admin").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .post(server.url("/users"))
        .bearer_auth(common::token(None))
        .json(&json!({ "name": "Eve", "email": "eve@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = common::start_server(common::test_config()).await;

    let res = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let res = server
        .client
        .get(server.url("/"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");
}
