use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{gate::require_open_session, AppState};

/// Trading routes. All of them sit behind the session gate.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/assets", get(get_assets))
        .route("/api/trade", get(run_trade).post(run_trade))
        .route("/api/profit-loss", get(get_profit_loss))
        .route_layer(middleware::from_fn_with_state(state, require_open_session))
}

fn failure(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
}

// ─── Assets ───────────────────────────────────────────────────────────────────

async fn get_assets(State(state): State<AppState>) -> Response {
    match state.orchestrator.tradable_assets().await {
        Ok(assets) => Json(assets).into_response(),
        Err(e) => {
            error!(error = %e, "Error fetching assets");
            failure("Failed to fetch assets.")
        }
    }
}

// ─── Trade ────────────────────────────────────────────────────────────────────

async fn run_trade(State(state): State<AppState>) -> Response {
    match state.orchestrator.run_once().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "Error executing trading logic");
            failure("Failed to execute trading logic.")
        }
    }
}

// ─── Profit / loss ────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfitLoss {
    profit_loss: f64,
}

async fn get_profit_loss(State(state): State<AppState>) -> Response {
    match state.orchestrator.profit_loss().await {
        Ok(profit_loss) => Json(ProfitLoss { profit_loss }).into_response(),
        Err(e) => {
            error!(error = %e, "Error fetching profit and loss");
            failure("Failed to fetch profit and loss.")
        }
    }
}
