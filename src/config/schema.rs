//! Configuration schema definitions.
//!
//! This module defines the complete configuration snapshot for the service.
//! All types derive Serde traits for deserialization from config files and
//! from the administrative JSON surface.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Concurrency ceiling applied to a resource group with no configured entry.
pub const DEFAULT_GROUP_LIMIT: usize = 20;

/// Placeholder shown in place of secrets.
pub const REDACTED: &str = "[redacted]";

/// Root configuration snapshot.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Datastore connection parameters.
    pub database: DatabaseConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Retry policy for data access.
    pub retry: RetryConfig,

    /// Feature flags.
    pub features: FeatureFlags,

    /// Per-resource-group concurrency ceilings.
    pub bulkhead: BulkheadConfig,

    /// Request gate settings (denylist, rate limit).
    pub gatekeeper: GatekeeperConfig,

    /// How caller identity is derived.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Concurrency ceiling for a resource group, falling back to the default.
    pub fn group_limit(&self, group: &str) -> usize {
        self.bulkhead
            .concurrency
            .get(group)
            .copied()
            .unwrap_or(DEFAULT_GROUP_LIMIT)
    }

    /// Copy safe to hand to clients: the token signing secret is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.identity.jwt_secret = REDACTED.to_string();
        config
    }
}

/// Primary (writes) and secondary (reads) datastore endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub primary: DatastoreEndpoint,
    pub secondary: DatastoreEndpoint,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            primary: DatastoreEndpoint::with_port(5432),
            secondary: DatastoreEndpoint::with_port(5433),
        }
    }
}

/// Connection parameters for one datastore endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatastoreEndpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DatastoreEndpoint {
    fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

impl Default for DatastoreEndpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "taskhub".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,

    /// Deployment environment label.
    pub environment: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body the gatekeeper will buffer for sanitization.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: "development".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Retry policy for the data-access wrapper.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,

    /// Factor applied to the delay after each failed retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_logging: bool,
    pub enable_cache: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_logging: true,
            enable_cache: false,
        }
    }
}

/// Bulkhead ceilings keyed by resource group name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BulkheadConfig {
    pub concurrency: BTreeMap<String, usize>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        let concurrency = [("users", 10), ("projects", 10), ("tasks", 10), ("statistics", 5)]
            .into_iter()
            .map(|(group, limit)| (group.to_string(), limit))
            .collect();
        Self { concurrency }
    }
}

/// Request gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Client addresses that are always refused.
    pub blocked_ips: Vec<IpAddr>,

    /// Fixed rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Requests allowed per client per window.
    pub rate_limit_max_requests: u32,

    /// How often expired rate-limit entries are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Resolve the client address from the first `X-Forwarded-For` hop.
    pub trust_forwarded_for: bool,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            blocked_ips: vec![
                IpAddr::from([192, 168, 1, 100]),
                IpAddr::from([10, 0, 0, 5]),
            ],
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 100,
            sweep_interval_secs: 300,
            trust_forwarded_for: false,
        }
    }
}

/// Source of the caller's role.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Role claim from a signed bearer token.
    Token,
    /// Role taken verbatim from the `x-user-role` header. Staging only.
    Header,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub mode: IdentityMode,

    /// HS256 secret shared with the token issuer.
    pub jwt_secret: String,

    /// Expected `iss` claim.
    pub issuer: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::Token,
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "secretkey".to_string(),
            issuer: "LocalIdP".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
