//! Axum route handlers for `/api/analytics` and `/api/openai/fitness-summary`.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::models::{window_days, AnalyticsModel, AnalyticsSnapshot};
use crate::analytics::stats::FitnessStats;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessSummaryResponse {
    pub summary: String,
    pub stats: FitnessStats,
    pub provider: &'static str,
    pub days: u32,
    pub generated_at: DateTime<Utc>,
}

/// GET /api/analytics?days=
pub async fn handle_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<WindowParams>,
) -> Result<Json<AnalyticsSnapshot>, AppError> {
    let snapshot = AnalyticsModel::new(state.cosmos.clone())
        .build_snapshot(&user.id, window_days(params.days), state.sentiment.clone())
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/openai/fitness-summary
/// Body is optional: `{"days": 30}`.
pub async fn handle_fitness_summary(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<WindowParams>>,
) -> Result<Json<FitnessSummaryResponse>, AppError> {
    let days = window_days(body.and_then(|Json(params)| params.days));
    let stats = AnalyticsModel::new(state.cosmos.clone())
        .fitness_stats(&user.id, days)
        .await?;
    let summary = state.summarizer.summarize(&stats, days).await?;

    Ok(Json(FitnessSummaryResponse {
        summary,
        stats,
        provider: state.summarizer.provider(),
        days,
        generated_at: Utc::now(),
    }))
}
