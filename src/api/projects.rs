use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::api::{id_param, idempotency_key, retry_policy, ApiResult};
use crate::http::request::PinnedConfig;
use crate::http::server::AppState;
use crate::security::GateContext;
use crate::store::{NewProject, Project, ProjectUpdate, Task};

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = retry_policy(&config)
        .retry("list_projects", || state.store.list_projects())
        .await?;
    Ok(Json(projects))
}

/// Routed, but no endpoint policy covers it, so the gatekeeper answers first.
pub async fn get_project(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<Project>> {
    let id = id_param(&ctx, "id")?;
    let project = retry_policy(&config)
        .retry("get_project", || state.store.get_project(id))
        .await?;
    Ok(Json(project))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    headers: HeaderMap,
    Json(body): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = retry_policy(&config)
        .retry_write("create_project", idempotency_key(&headers), || {
            state.store.create_project(body.clone())
        })
        .await?;
    tracing::info!(project_id = project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
    Json(body): Json<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    let id = id_param(&ctx, "id")?;
    let project = retry_policy(&config)
        .retry_write("update_project", idempotency_key(&headers), || {
            state.store.update_project(id, body.clone())
        })
        .await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let id = id_param(&ctx, "id")?;
    retry_policy(&config)
        .retry_write("delete_project", idempotency_key(&headers), || {
            state.store.delete_project(id)
        })
        .await?;
    tracing::info!(project_id = id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn project_tasks(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<Vec<Task>>> {
    let id = id_param(&ctx, "id")?;
    let tasks = retry_policy(&config)
        .retry("tasks_by_project", || state.store.tasks_by_project(id, false))
        .await?;
    Ok(Json(tasks))
}

pub async fn pending_project_tasks(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<Vec<Task>>> {
    let id = id_param(&ctx, "id")?;
    let tasks = retry_policy(&config)
        .retry("pending_tasks_by_project", || state.store.tasks_by_project(id, true))
        .await?;
    Ok(Json(tasks))
}
