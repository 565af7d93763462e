//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use taskhub::config::{AppConfig, ConfigStore, IdentityMode};
use taskhub::security::identity::{Role, RoleClaims};
use taskhub::store::MemoryStore;
use taskhub::{AppState, HttpServer, Shutdown};

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request asserting `role` through the legacy header.
    pub fn as_role(&self, method: reqwest::Method, path: &str, role: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("x-user-role", role)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config suited to tests: header identity, fast retries, no denylisted loopback.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.identity.mode = IdentityMode::Header;
    config.retry.initial_delay_ms = 10;
    config.gatekeeper.rate_limit_max_requests = 10_000;
    config
}

/// Start the server on an ephemeral loopback port.
pub async fn start_server(config: AppConfig) -> TestServer {
    let store = Arc::new(MemoryStore::seeded().await);
    let config = Arc::new(ConfigStore::in_memory(config));
    let state = AppState::new(config, store.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (_updates_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(state.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        state,
        store,
        shutdown,
        client,
    }
}

/// Mint a token the default identity config accepts.
pub fn token(role: Option<Role>) -> String {
    token_signed_with(role, "secretkey")
}

/// Mint a token signed with `secret`.
pub fn token_signed_with(role: Option<Role>, secret: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    let claims = RoleClaims {
        sub: "tester".into(),
        iss: "LocalIdP".into(),
        exp,
        role,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}
