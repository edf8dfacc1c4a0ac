//! Axum route handlers for `/api/fitness`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::fitness::models::{
    FitnessDocument, FitnessFilter, FitnessModel, MeasurementInput, WorkoutInput,
};
use crate::state::AppState;

/// GET /api/fitness?type=&from=&to=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<FitnessFilter>,
) -> Result<Json<Vec<FitnessDocument>>, AppError> {
    let records = FitnessModel::new(state.cosmos.clone())
        .list_records(&user.id, &filter)
        .await?;
    Ok(Json(records))
}

/// POST /api/fitness/workouts
pub async fn handle_log_workout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<WorkoutInput>,
) -> Result<(StatusCode, Json<FitnessDocument>), AppError> {
    let record = FitnessModel::new(state.cosmos.clone())
        .log_workout(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/fitness/measurements
pub async fn handle_log_measurement(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<MeasurementInput>,
) -> Result<(StatusCode, Json<FitnessDocument>), AppError> {
    let record = FitnessModel::new(state.cosmos.clone())
        .log_measurement(&user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/fitness/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FitnessDocument>, AppError> {
    let record = FitnessModel::new(state.cosmos.clone())
        .get_record(&user.id, &id)
        .await?;
    Ok(Json(record))
}

/// PUT /api/fitness/:id
///
/// Body is a partial document; listed fields replace the stored ones, `null` removes them.
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<FitnessDocument>, AppError> {
    let record = FitnessModel::new(state.cosmos.clone())
        .update_fitness_record(&user.id, &id, patch)
        .await?;
    Ok(Json(record))
}

/// DELETE /api/fitness/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    FitnessModel::new(state.cosmos.clone())
        .delete_fitness_record(&user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
