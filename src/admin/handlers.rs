use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{AppConfig, ConfigError};
use crate::http::request::PinnedConfig;
use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::resilience::GroupStats;
use crate::security::identity::{Role, X_USER_ROLE};

/// Admin echo of a snapshot. Secrets are masked.
#[derive(Serialize)]
pub struct ConfigView {
    pub message: &'static str,
    pub config: AppConfig,
}

impl ConfigView {
    fn new(message: &'static str, config: &AppConfig) -> Self {
        Self {
            message,
            config: config.redacted(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub datastore: &'static str,
    pub identity_mode: crate::config::IdentityMode,
}

#[derive(Deserialize)]
pub struct ChangeRole {
    pub role: String,
}

fn config_error(e: ConfigError) -> Response {
    if e.is_client_error() {
        tracing::warn!(error = %e, "Rejected configuration update");
        error_response(StatusCode::BAD_REQUEST, e.to_string())
    } else {
        tracing::error!(error = %e, "Failed to apply configuration update");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

pub async fn root() -> &'static str {
    "taskhub API running"
}

/// The snapshot this request was admitted under.
pub async fn get_config(Extension(PinnedConfig(config)): Extension<PinnedConfig>) -> Json<ConfigView> {
    Json(ConfigView::new("Current configuration", &config))
}

pub async fn replace_config(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state.config.replace(body) {
        Ok(config) => Json(ConfigView::new("Configuration replaced", &config)).into_response(),
        Err(e) => config_error(e),
    }
}

pub async fn patch_config(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state.config.merge(body) {
        Ok(config) => {
            Json(ConfigView::new("Configuration partially updated", &config)).into_response()
        }
        Err(e) => config_error(e),
    }
}

pub async fn bulkhead_metrics(State(state): State<AppState>) -> Json<BTreeMap<String, GroupStats>> {
    Json(state.bulkhead.metrics())
}

pub async fn health(
    State(state): State<AppState>,
    Extension(PinnedConfig(config)): Extension<PinnedConfig>,
) -> (StatusCode, Json<HealthStatus>) {
    let (status, code, datastore) = match state.store.ping().await {
        Ok(()) => ("ok", StatusCode::OK, "up"),
        Err(e) => {
            tracing::warn!(error = %e, "Health probe could not reach datastore");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };
    (
        code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION"),
            datastore,
            identity_mode: config.identity.mode,
        }),
    )
}

/// Validate a role name and tell the caller how to assert it.
pub async fn change_role(Json(body): Json<ChangeRole>) -> Response {
    match body.role.parse::<Role>() {
        Ok(role) => Json(json!({
            "message": format!("Role changed to: {}", role),
            "instructions": format!(
                "Send '{}: {}' (header mode) or a bearer token carrying role '{}' on subsequent requests",
                X_USER_ROLE, role, role
            ),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": e.to_string(),
                "valid_roles": Role::ALL,
            })),
        )
            .into_response(),
    }
}
