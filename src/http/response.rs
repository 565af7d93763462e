//! Request-outcome taxonomy and its HTTP mapping.
//!
//! Every rejection carries the structured detail a client needs to adapt
//! (group, limits, required roles, retry-after) in a JSON body of the form
//! `{ "error": ..., "code": ..., ...details }`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::security::identity::Role;

/// Why a request was refused before (or instead of) reaching a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("access denied")]
    AccessDenied,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("resource group '{group}' at capacity ({current}/{limit})")]
    ResourceExhausted {
        group: String,
        current: usize,
        limit: usize,
    },

    #[error("no policy for endpoint")]
    NotFound,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("insufficient permissions")]
    PermissionDenied { required_roles: Vec<Role> },

    #[error("internal error")]
    InternalError,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::AccessDenied => StatusCode::FORBIDDEN,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Rejection::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Rejection::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::AccessDenied => "IP_BLOCKED",
            Rejection::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Rejection::ResourceExhausted { .. } => "BULKHEAD_FULL",
            Rejection::NotFound => "ENDPOINT_NOT_FOUND",
            Rejection::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Rejection::PermissionDenied { .. } => "INSUFFICIENT_PERMISSIONS",
            Rejection::InternalError => "GATEKEEPER_ERROR",
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        match self {
            Rejection::RateLimited { retry_after_secs } => {
                body["retry_after"] = json!(retry_after_secs);
            }
            Rejection::ResourceExhausted { group, current, limit } => {
                body["group"] = json!(group);
                body["current_load"] = json!(current);
                body["max_concurrency"] = json!(limit);
            }
            Rejection::PermissionDenied { required_roles } => {
                body["required_roles"] = json!(required_roles);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Rejection::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Plain JSON error for handler-level failures.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
