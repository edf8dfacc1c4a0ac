//! Axum route handlers for `/api/journal`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::journal::models::{EntryFilter, EntryUpdate, JournalEntry, JournalModel, NewEntry};
use crate::state::AppState;

fn model(state: &AppState) -> JournalModel {
    JournalModel::new(state.cosmos.clone(), state.sentiment.clone())
}

/// GET /api/journal?tag=&from=&to=
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<EntryFilter>,
) -> Result<Json<Vec<JournalEntry>>, AppError> {
    let entries = model(&state).list_entries(&user.id, &filter).await?;
    Ok(Json(entries))
}

/// POST /api/journal
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewEntry>,
) -> Result<(StatusCode, Json<JournalEntry>), AppError> {
    let entry = model(&state).create_entry(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/journal/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JournalEntry>, AppError> {
    let entry = model(&state).get_entry(&user.id, &id).await?;
    Ok(Json(entry))
}

/// PUT /api/journal/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(update): Json<EntryUpdate>,
) -> Result<Json<JournalEntry>, AppError> {
    let entry = model(&state).update_entry(&user.id, &id, update).await?;
    Ok(Json(entry))
}

/// DELETE /api/journal/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    model(&state).delete_entry(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
