//! Axum route handlers for `/api/habits`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::habits::models::{CheckIn, Habit, HabitFilter, HabitModel, HabitUpdate, NewHabit};
use crate::pagination::Page;
use crate::state::AppState;

/// GET /api/habits?frequency=&page=&pageSize=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<HabitFilter>,
) -> Result<Json<Page<Habit>>, AppError> {
    let page = HabitModel::new(state.cosmos.clone())
        .list(&user.id, &filter)
        .await?;
    Ok(Json(page))
}

/// POST /api/habits
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewHabit>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let habit = HabitModel::new(state.cosmos.clone())
        .create(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(habit)))
}

/// GET /api/habits/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Habit>, AppError> {
    let habit = HabitModel::new(state.cosmos.clone())
        .get(&user.id, &id)
        .await?;
    Ok(Json(habit))
}

/// PUT /api/habits/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<HabitUpdate>,
) -> Result<Json<Habit>, AppError> {
    let habit = HabitModel::new(state.cosmos.clone())
        .update(&user.id, &id, update)
        .await?;
    Ok(Json(habit))
}

/// DELETE /api/habits/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    HabitModel::new(state.cosmos.clone())
        .delete(&user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/habits/:id/check-in
/// Body is optional: `{"date": "YYYY-MM-DD"}`, today when absent.
pub async fn handle_check_in(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Option<Json<CheckIn>>,
) -> Result<Json<Habit>, AppError> {
    let date = body.and_then(|Json(check_in)| check_in.date);
    let habit = HabitModel::new(state.cosmos.clone())
        .check_in(&user.id, &id, date)
        .await?;
    Ok(Json(habit))
}
