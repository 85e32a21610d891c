use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(healthz))
}

async fn banner() -> &'static str {
    "Alpaca Trading Backend is running!"
}

/// Health check endpoint, never gated.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let engine_state = state.engine.state().await;
    Json(json!({
        "status": "ok",
        "engine": engine_state.to_string(),
        "mode": state.trading_mode.to_string(),
    }))
}
