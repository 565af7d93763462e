use axum::extract::State;
use axum::{Extension, Json};

use crate::api::{retry_policy, ApiError, ApiResult};
use crate::http::request::PinnedConfig;
use crate::http::server::AppState;
use crate::security::GateContext;
use crate::store::ProjectStatistics;

pub async fn all_statistics(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
) -> ApiResult<Json<Vec<ProjectStatistics>>> {
    let stats = retry_policy(&config)
        .retry("statistics", || state.store.statistics())
        .await?;
    Ok(Json(stats))
}

/// `/statistics/{project_id}`; the wildcard tail must be a project id.
pub async fn project_statistics(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<ProjectStatistics>> {
    let project_id: u64 = ctx
        .param("section")
        .and_then(|s| s.parse().ok())
        .ok_or(ApiError::BadParam("section"))?;
    let stats = retry_policy(&config)
        .retry("project_statistics", || state.store.project_statistics(project_id))
        .await?;
    Ok(Json(stats))
}
