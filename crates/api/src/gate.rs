use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::AppState;

/// Middleware that only lets trading routes through while the session is open.
pub async fn require_open_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.session_gating || state.engine.is_trading().await {
        return next.run(request).await;
    }

    let engine = state.engine.state().await;
    debug!(path = %request.uri().path(), %engine, "Rejected request outside trading session");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "trading session closed",
            "engine": engine.to_string(),
        })),
    )
        .into_response()
}
