//! Request gate applied to every inbound request before business logic.
//!
//! # Pipeline
//! ```text
//! client address
//!     → IP denylist          (AccessDenied)
//!     → fixed-window limit   (RateLimited)
//!     → sanitize params/query/body
//!     → endpoint policy      (NotFound / AuthenticationRequired / PermissionDenied)
//!     → audit record
//!     → next layer
//! ```
//!
//! Stages run synchronously against one pinned configuration snapshot. Only
//! buffering the request body suspends.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, uri::PathAndQuery, HeaderMap, Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::{AppConfig, GatekeeperConfig};
use crate::http::request::PinnedConfig;
use crate::http::response::Rejection;
use crate::observability::metrics;
use crate::routing::router::PolicyTable;
use crate::security::identity::{Role, RoleResolver};
use crate::security::rate_limit::{FixedWindowLimiter, RateDecision, RateLimitPolicy};
use crate::security::sanitize;

/// Per-request result of a successful pass through the gate.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub client: IpAddr,
    pub role: Option<Role>,
    /// Sanitized route parameters captured by the matching policy.
    pub params: HashMap<String, String>,
}

impl GateContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// One audited access decision.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp_ms: u128,
    pub method: Method,
    pub path: String,
    pub client: IpAddr,
    pub role: Option<Role>,
    pub outcome: &'static str,
}

impl AuditRecord {
    fn emit(&self) {
        tracing::info!(
            target: "taskhub::audit",
            timestamp_ms = self.timestamp_ms as u64,
            method = %self.method,
            path = %self.path,
            client = %self.client,
            role = self.role.map(|r| r.as_str()).unwrap_or("anonymous"),
            outcome = self.outcome,
            "access"
        );
    }
}

/// Owns the policy table and the rate limit state for the process.
pub struct Gatekeeper {
    policies: PolicyTable,
    limiter: Arc<FixedWindowLimiter>,
}

impl Gatekeeper {
    pub fn new(policies: PolicyTable, limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { policies, limiter }
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Resolve the client address, honouring `X-Forwarded-For` only when trusted.
    pub fn client_address(config: &GatekeeperConfig, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
        if config.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse().ok());
            if let Some(ip) = forwarded {
                return ip;
            }
        }
        peer.ip()
    }

    /// Stage 1: denylist.
    pub fn check_ip(&self, config: &GatekeeperConfig, client: IpAddr) -> Result<(), Rejection> {
        if config.blocked_ips.contains(&client) {
            tracing::warn!(client = %client, "Blocked address refused");
            return Err(Rejection::AccessDenied);
        }
        Ok(())
    }

    /// Stage 2: fixed-window rate limit.
    pub fn check_rate(&self, config: &GatekeeperConfig, client: IpAddr) -> Result<(), Rejection> {
        match self.limiter.check(&client.to_string(), RateLimitPolicy::from(config)) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after_secs } => {
                tracing::warn!(client = %client, retry_after_secs, "Rate limit exceeded");
                Err(Rejection::RateLimited { retry_after_secs })
            }
        }
    }

    /// Stage 4: policy match and role check.
    pub fn authorize(
        &self,
        resolver: &RoleResolver,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> (Option<Role>, Result<HashMap<String, String>, Rejection>) {
        let Some(matched) = self.policies.find(method, path) else {
            return (None, Err(Rejection::NotFound));
        };

        let role = resolver.resolve(headers);
        if !matched.policy.requires_auth {
            return (role, Ok(matched.params));
        }

        match role {
            None => (None, Err(Rejection::AuthenticationRequired)),
            Some(r) if !matched.policy.allows(r) => (
                role,
                Err(Rejection::PermissionDenied {
                    required_roles: matched.policy.allowed_roles.clone(),
                }),
            ),
            Some(_) => (role, Ok(matched.params)),
        }
    }

    /// Run the whole pipeline, returning the request to forward.
    pub async fn admit(
        &self,
        config: &AppConfig,
        peer: SocketAddr,
        request: Request,
    ) -> Result<Request, Rejection> {
        let client = Self::client_address(&config.gatekeeper, peer, request.headers());

        self.check_ip(&config.gatekeeper, client)?;
        self.check_rate(&config.gatekeeper, client)?;

        let mut request = sanitize_request(request, config.server.max_body_bytes).await?;

        let resolver = RoleResolver::new(&config.identity);
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let (role, outcome) = self.authorize(&resolver, &method, &path, request.headers());

        AuditRecord {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            method,
            path,
            client,
            role,
            outcome: match &outcome {
                Ok(_) => "allowed",
                Err(rejection) => rejection.code(),
            },
        }
        .emit();

        let mut params = outcome?;
        sanitize::clean_params(&mut params);

        request.extensions_mut().insert(GateContext { client, role, params });
        Ok(request)
    }
}

/// Stage 3: rewrite the query string and top-level JSON body fields.
async fn sanitize_request(request: Request, max_body_bytes: usize) -> Result<Request, Rejection> {
    let (mut parts, body) = request.into_parts();

    if let Some(cleaned) = parts.uri.query().and_then(sanitize::clean_query) {
        let path_and_query: PathAndQuery = format!("{}?{}", parts.uri.path(), cleaned)
            .parse()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to rebuild sanitized query");
                Rejection::InternalError
            })?;
        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.path_and_query = Some(path_and_query);
        parts.uri = Uri::from_parts(uri_parts).map_err(|e| {
            tracing::error!(error = %e, "Failed to rebuild sanitized URI");
            Rejection::InternalError
        })?;
    }

    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return Ok(Request::from_parts(parts, body));
    }

    let bytes = axum::body::to_bytes(body, max_body_bytes).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to buffer request body");
        Rejection::InternalError
    })?;

    // Malformed JSON is left for the handler's extractor to reject.
    let body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            if sanitize::clean_body(&mut value) {
                let rewritten = serde_json::to_vec(&value).map_err(|_| Rejection::InternalError)?;
                parts.headers.remove(header::CONTENT_LENGTH);
                Body::from(rewritten)
            } else {
                Body::from(bytes)
            }
        }
        Err(_) => Body::from(bytes),
    };

    Ok(Request::from_parts(parts, body))
}

/// Axum middleware wrapping [`Gatekeeper::admit`].
pub async fn gatekeeper_middleware(
    State(gatekeeper): State<Arc<Gatekeeper>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let Some(PinnedConfig(config)) = request.extensions().get::<PinnedConfig>().cloned() else {
        tracing::error!("Gatekeeper reached without a pinned configuration snapshot");
        metrics::record_gatekeeper_rejection(Rejection::InternalError.code());
        return Rejection::InternalError.into_response();
    };

    match gatekeeper.admit(&config, peer, request).await {
        Ok(request) => next.run(request).await,
        Err(rejection) => {
            metrics::record_gatekeeper_rejection(rejection.code());
            rejection.into_response()
        }
    }
}
