//! Axum route handlers for `/api/tasks`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::tasks::models::{NewTask, Task, TaskFilter, TaskModel, TaskUpdate};

/// GET /api/tasks?status=&priority=&projectId=&tag=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = TaskModel::new(state.cosmos.clone())
        .list_tasks(&user.id, &filter)
        .await?;
    Ok(Json(tasks))
}

/// POST /api/tasks
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = TaskModel::new(state.cosmos.clone())
        .create_task(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = TaskModel::new(state.cosmos.clone())
        .get_task(&user.id, &id)
        .await?;
    Ok(Json(task))
}

/// PUT /api/tasks/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, AppError> {
    let task = TaskModel::new(state.cosmos.clone())
        .update_task(&user.id, &id, update)
        .await?;
    Ok(Json(task))
}

/// DELETE /api/tasks/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    TaskModel::new(state.cosmos.clone())
        .delete_task(&user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
