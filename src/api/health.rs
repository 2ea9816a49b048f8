use axum::extract::State;
use axum::Json;

use crate::api::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the registry is reachable; reports how many keys are loaded.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let keys = state.controller.keys().len();
    Json(serde_json::json!({"status": "ready", "keys": keys}))
}
