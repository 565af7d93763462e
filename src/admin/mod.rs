//! Administrative surface: live configuration, bulkhead load, health and the
//! role-change helper.
//!
//! Access is decided by the gatekeeper's endpoint policies like any other
//! route; `/config` is admin-only, the rest are public.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/config", get(get_config).put(replace_config).patch(patch_config))
        .route("/bulkhead/metrics", get(bulkhead_metrics))
        .route("/auth/change-role", post(change_role))
}
