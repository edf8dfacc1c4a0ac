//! Axum route handlers for `/api/activities`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::activities::models::{
    Activity, ActivityFilter, ActivityModel, ActivityUpdate, NewActivity,
};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::pagination::Page;
use crate::state::AppState;

/// GET /api/activities?category=&from=&to=&page=&pageSize=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Page<Activity>>, AppError> {
    let page = ActivityModel::new(state.cosmos.clone())
        .list(&user.id, &filter)
        .await?;
    Ok(Json(page))
}

/// POST /api/activities
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let activity = ActivityModel::new(state.cosmos.clone())
        .create(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// GET /api/activities/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Activity>, AppError> {
    let activity = ActivityModel::new(state.cosmos.clone())
        .get(&user.id, &id)
        .await?;
    Ok(Json(activity))
}

/// PUT /api/activities/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<ActivityUpdate>,
) -> Result<Json<Activity>, AppError> {
    let activity = ActivityModel::new(state.cosmos.clone())
        .update(&user.id, &id, update)
        .await?;
    Ok(Json(activity))
}

/// DELETE /api/activities/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ActivityModel::new(state.cosmos.clone())
        .delete(&user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
