use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::{UserModel, UserProfile};
use crate::state::AppState;

/// GET /api/users/me
/// Creates the caller's profile on first call, refreshes `lastLoginAt` afterwards.
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = UserModel::new(state.cosmos.clone())
        .upsert_from_identity(&user)
        .await?;
    Ok(Json(profile))
}
