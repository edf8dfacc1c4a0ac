//! Axum route handlers for `/api/goals`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::goals::models::{Goal, GoalFilter, GoalModel, GoalUpdate, NewGoal};
use crate::pagination::Page;
use crate::state::AppState;

/// GET /api/goals?achieved=&category=&page=&pageSize=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<GoalFilter>,
) -> Result<Json<Page<Goal>>, AppError> {
    let page = GoalModel::new(state.cosmos.clone())
        .list(&user.id, &filter)
        .await?;
    Ok(Json(page))
}

/// POST /api/goals
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewGoal>,
) -> Result<(StatusCode, Json<Goal>), AppError> {
    let goal = GoalModel::new(state.cosmos.clone())
        .create(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// GET /api/goals/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Goal>, AppError> {
    let goal = GoalModel::new(state.cosmos.clone()).get(&user.id, &id).await?;
    Ok(Json(goal))
}

/// PUT /api/goals/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<GoalUpdate>,
) -> Result<Json<Goal>, AppError> {
    let goal = GoalModel::new(state.cosmos.clone())
        .update(&user.id, &id, update)
        .await?;
    Ok(Json(goal))
}

/// DELETE /api/goals/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    GoalModel::new(state.cosmos.clone())
        .delete(&user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
