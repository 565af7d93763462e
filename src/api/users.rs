use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::api::{id_param, idempotency_key, retry_policy, ApiResult};
use crate::http::request::PinnedConfig;
use crate::http::server::AppState;
use crate::security::GateContext;
use crate::store::{NewUser, Task, User};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
) -> ApiResult<Json<Vec<User>>> {
    let users = retry_policy(&config)
        .retry("list_users", || state.store.list_users())
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    headers: HeaderMap,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = retry_policy(&config)
        .retry_write("create_user", idempotency_key(&headers), || {
            state.store.create_user(body.clone())
        })
        .await?;
    tracing::info!(user_id = user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let id = id_param(&ctx, "id")?;
    retry_policy(&config)
        .retry_write("delete_user", idempotency_key(&headers), || state.store.delete_user(id))
        .await?;
    tracing::info!(user_id = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_tasks(
    State(state): State<AppState>,
    Extension(config): Extension<PinnedConfig>,
    Extension(ctx): Extension<GateContext>,
) -> ApiResult<Json<Vec<Task>>> {
    let id = id_param(&ctx, "id")?;
    let tasks = retry_policy(&config)
        .retry("tasks_by_user", || state.store.tasks_by_user(id))
        .await?;
    Ok(Json(tasks))
}
