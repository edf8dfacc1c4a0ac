use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness plus the backends this instance is running on. No auth.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "lifetracker-api",
        "environment": state.config.node_env,
        "storage": state.cosmos.mode(),
        "auth": state.verifier.mode(),
        "sentiment": state.sentiment.backend(),
        "summaries": state.summarizer.provider(),
    }))
}
