//! Request preparation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on the response
//! - Pin one configuration snapshot for the whole request
//! - Record request count and latency
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The snapshot travels as a request extension; no layer below reads the
//!   store directly, so a concurrent reload never splits a request

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::{AppConfig, ConfigStore};
use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The configuration snapshot a request was admitted under.
#[derive(Debug, Clone)]
pub struct PinnedConfig(pub Arc<AppConfig>);

/// Read the request ID set by [`set_request_id_layer`].
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Pin the current snapshot, log the request when enabled, record metrics.
pub async fn pin_snapshot(
    State(store): State<Arc<ConfigStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let snapshot = store.snapshot();
    let log_requests = snapshot.features.enable_logging;

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().to_string();

    request.extensions_mut().insert(PinnedConfig(snapshot));
    let mut response = next.run(request).await;

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);
    if log_requests {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().entry(X_REQUEST_ID).or_insert(value);
    }
    response
}
