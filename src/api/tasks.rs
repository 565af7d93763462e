use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::api::{id_param, idempotency_key, retry_policy, ApiResult};
use crate::http::request::PinnedConfig;
use crate::http::server::AppState;
use crate::security::GateContext;
use crate::store::{NewTask, Task, TaskUpdate};

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = retry_policy(&config)
        .retry("list_tasks", || state.store.list_tasks())
        .await?;
    Ok(Json(tasks))
}

/// Routed, but no endpoint policy covers it, so the gatekeeper answers first.
pub async fn get_task(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<Task>> {
    let id = id_param(&ctx, "id")?;
    let task = retry_policy(&config)
        .retry("get_task", || state.store.get_task(id))
        .await?;
    Ok(Json(task))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    headers: HeaderMap,
    Json(body): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = retry_policy(&config)
        .retry_write("create_task", idempotency_key(&headers), || {
            state.store.create_task(body.clone())
        })
        .await?;
    tracing::info!(task_id = task.id, project_id = task.project_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
    Json(body): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    let id = id_param(&ctx, "id")?;
    let task = retry_policy(&config)
        .retry_write("update_task", idempotency_key(&headers), || {
            state.store.update_task(id, body.clone())
        })
        .await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let id = id_param(&ctx, "id")?;
    retry_policy(&config)
        .retry_write("delete_task", idempotency_key(&headers), || state.store.delete_task(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
