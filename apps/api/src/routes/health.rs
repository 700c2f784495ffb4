use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / and GET /health
/// Returns service version, configured model and the number of live sessions.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "interviewer-api",
        "model": state.config.gemini_model,
        "active_sessions": state.pipeline.store().len().await,
    }))
}
