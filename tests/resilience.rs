//! Bulkhead, retry and live-configuration behaviour through the HTTP surface.

use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use taskhub::config::{IdentityMode, REDACTED};
use taskhub::security::identity::Role;

mod common;

#[tokio::test]
async fn test_bulkhead_rejects_sixth_concurrent_request() {
    let mut config = common::test_config();
    config.bulkhead.concurrency.insert("projects".into(), 5);
    let server = common::start_server(config).await;
    server.store.set_latency(Duration::from_millis(400));

    let requests = (0..6).map(|_| server.as_role(Method::GET, "/projects", "designer").send());
    let responses = futures_util::future::join_all(requests).await;

    let statuses: Vec<StatusCode> = responses.into_iter().map(|r| r.unwrap().status()).collect();
    let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let full = statuses
        .iter()
        .filter(|s| **s == StatusCode::SERVICE_UNAVAILABLE)
        .count();
    assert_eq!((ok, full), (5, 1), "statuses: {:?}", statuses);

    server.store.set_latency(Duration::ZERO);
    let metrics: Value = server
        .client
        .get(server.url("/bulkhead/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["projects"]["accepted"], 5);
    assert_eq!(metrics["projects"]["rejected"], 1);
    assert_eq!(metrics["projects"]["current"], 0);
    assert_eq!(metrics["projects"]["limit"], 5);
}

#[tokio::test]
async fn test_bulkhead_rejection_body() {
    let mut config = common::test_config();
    config.bulkhead.concurrency.insert("statistics".into(), 1);
    let server = common::start_server(config).await;
    server.store.set_latency(Duration::from_millis(300));

    let slow = server.as_role(Method::GET, "/statistics", "admin").send();
    let fast = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        server.as_role(Method::GET, "/statistics", "admin").send().await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow.unwrap().status(), StatusCode::OK);
    let fast = fast.unwrap();
    assert_eq!(fast.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = fast.json().await.unwrap();
    assert_eq!(body["code"], "BULKHEAD_FULL");
    assert_eq!(body["group"], "statistics");
    assert_eq!(body["current_load"], 1);
    assert_eq!(body["max_concurrency"], 1);
}

#[tokio::test]
async fn test_reads_retry_through_transient_failures() {
    let server = common::start_server(common::test_config()).await;
    let before = server.store.calls();
    server.store.fail_next(2);

    let start = Instant::now();
    let res = server.as_role(Method::GET, "/users", "tester").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.store.calls() - before, 3);
    assert!(start.elapsed() >= Duration::from_millis(10 + 20));
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    let server = common::start_server(common::test_config()).await;
    let before = server.store.calls();
    server.store.fail_next(10);

    let res = server.as_role(Method::GET, "/tasks", "tester").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(server.store.calls() - before, 4);
    server.store.fail_next(0);
}

#[tokio::test]
async fn test_writes_retry_only_with_idempotency_key() {
    let server = common::start_server(common::test_config()).await;

    server.store.fail_next(1);
    let res = server
        .as_role(Method::POST, "/users", "admin")
        .json(&json!({ "name": "Ken", "email": "ken@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    server.store.fail_next(1);
    let res = server
        .as_role(Method::POST, "/users", "admin")
        .header("idempotency-key", "create-ken-1")
        .json(&json!({ "name": "Ken", "email": "ken@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_retry_policy_follows_live_config() {
    let server = common::start_server(common::test_config()).await;

    let res = server
        .as_role(Method::PATCH, "/config", "admin")
        .json(&json!({ "retry": { "max_retries": 0 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["config"]["retry"]["max_retries"], 0);
    assert_eq!(body["config"]["retry"]["initial_delay_ms"], 10);

    let before = server.store.calls();
    server.store.fail_next(1);
    let res = server.as_role(Method::GET, "/users", "admin").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(server.store.calls() - before, 1);
}

#[tokio::test]
async fn test_config_admin_surface() {
    let server = common::start_server(common::test_config()).await;

    let res = server.as_role(Method::GET, "/config", "developer").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .as_role(Method::PUT, "/config", "admin")
        .json(&json!({ "server": { "port": 4000 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .as_role(Method::PATCH, "/config", "admin")
        .json(&json!({ "retry": { "backoff_multiplier": 0.5 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .as_role(Method::PATCH, "/config", "admin")
        .json(&json!({ "features": { "enable_cache": true }, "unknown": { "x": 1 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let current: Value = server
        .as_role(Method::GET, "/config", "admin")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["config"]["features"]["enable_cache"], true);
    assert_eq!(current["config"]["features"]["enable_logging"], true);
    assert_eq!(current["config"]["retry"]["backoff_multiplier"], 2.0);
    assert!(current["config"].get("unknown").is_none());
}

#[tokio::test]
async fn test_change_role_helper() {
    let server = common::start_server(common::test_config()).await;

    let res = server
        .client
        .post(server.url("/auth/change-role"))
        .json(&json!({ "role": "tester" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .post(server.url("/auth/change-role"))
        .json(&json!({ "role": "root" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["valid_roles"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_config_replace_keeps_signing_secret() {
    let mut config = common::test_config();
    config.identity.mode = IdentityMode::Token;
    config.identity.jwt_secret = "operator-chosen-secret".into();
    let server = common::start_server(config).await;

    let operator = common::token_signed_with(Some(Role::Admin), "operator-chosen-secret");
    let forged = common::token(Some(Role::Admin));

    let res = server
        .client
        .get(server.url("/config"))
        .bearer_auth(&forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .put(server.url("/config"))
        .bearer_auth(&operator)
        .json(&json!({
            "database": {},
            "server": { "port": 3000 },
            "retry": { "max_retries": 1, "initial_delay_ms": 10 },
            "features": {},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["config"]["identity"]["jwt_secret"], REDACTED);
    assert_eq!(body["config"]["identity"]["mode"], "token");

    let res = server
        .client
        .get(server.url("/config"))
        .bearer_auth(&forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .get(server.url("/config"))
        .bearer_auth(&operator)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["config"]["identity"]["jwt_secret"], REDACTED);
    assert_eq!(body["config"]["retry"]["max_retries"], 1);
}
