//! Business handlers for users, projects, tasks and statistics.
//!
//! Handlers run only after the gatekeeper and the group's bulkhead have
//! admitted the request. Route parameters are read from the sanitized
//! [`GateContext`](crate::security::GateContext), and every data call goes
//! through the retry policy of the pinned snapshot.

pub mod projects;
pub mod statistics;
pub mod tasks;
pub mod users;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::request::PinnedConfig;
use crate::http::response::error_response;
use crate::resilience::RetryPolicy;
use crate::security::GateContext;
use crate::store::StoreError;

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// Handler-level failure.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    BadParam(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Store(e @ StoreError::NotFound { .. }) => {
                error_response(StatusCode::NOT_FOUND, e.to_string())
            }
            ApiError::Store(e @ StoreError::Invalid(_)) => {
                error_response(StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Store(e @ StoreError::Unavailable(_)) => {
                tracing::error!(error = %e, "Datastore call failed after retries");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::BadParam(name) => {
                error_response(StatusCode::BAD_REQUEST, format!("invalid parameter: {}", name))
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Numeric route parameter captured by the matching policy.
pub(crate) fn id_param(ctx: &GateContext, name: &'static str) -> ApiResult<u64> {
    ctx.param(name)
        .and_then(|v| v.parse().ok())
        .ok_or(ApiError::BadParam(name))
}

pub(crate) fn retry_policy(config: &PinnedConfig) -> RetryPolicy {
    RetryPolicy::from(&config.0.retry)
}

pub(crate) fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
