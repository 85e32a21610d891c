use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use common::{Error, MarketDataSource, OrderSide, OrderSink, Timeframe, TradeIntent};
use engine::AlpacaClient;

const KEY: &str = "test-key";
const SECRET: &str = "test-secret";

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("APCA-API-KEY-ID").and_then(|v| v.to_str().ok()) == Some(KEY)
        && headers.get("APCA-API-SECRET-KEY").and_then(|v| v.to_str().ok()) == Some(SECRET)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"code": 40110000, "message": "request is not authorized"})),
    )
}

async fn assets(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([
            {"id": "1", "class": "us_equity", "symbol": "AAPL", "name": "Apple", "tradable": true, "status": "active"},
            {"id": "2", "class": "us_equity", "symbol": "HALT", "name": "Halted", "tradable": false, "status": "active"},
            {"id": "3", "class": "crypto", "symbol": "BTC/USD", "name": "Bitcoin", "tradable": true, "status": "active"}
        ])),
    )
}

async fn bars(
    headers: HeaderMap,
    Path(symbol): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    if symbol == "DOWN" {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "maintenance"})));
    }
    assert_eq!(q.get("timeframe").map(String::as_str), Some("1Min"));
    assert_eq!(q.get("sort").map(String::as_str), Some("desc"));
    assert_eq!(q.get("feed").map(String::as_str), Some("iex"));
    assert_eq!(q.get("limit").map(String::as_str), Some("3"));
    // newest first, as requested by sort=desc
    (
        StatusCode::OK,
        Json(json!({
            "bars": [
                {"t": "2024-03-04T15:03:00Z", "o": 3.0, "h": 3.0, "l": 3.0, "c": 3.0, "v": 10},
                {"t": "2024-03-04T15:02:00Z", "o": 2.0, "h": 2.0, "l": 2.0, "c": 2.0, "v": 10},
                {"t": "2024-03-04T15:01:00Z", "o": 1.0, "h": 1.0, "l": 1.0, "c": 1.0, "v": 10}
            ],
            "symbol": symbol,
            "next_page_token": null
        })),
    )
}

async fn account(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({"id": "acct", "equity": "1000.50", "cash": "800.25", "status": "ACTIVE"})),
    )
}

async fn orders(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["symbol"] == "POOR" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"code": 40310000, "message": "insufficient buying power"})),
        );
    }
    assert_eq!(body["type"], "market");
    assert_eq!(body["time_in_force"], "day");
    assert_eq!(body["qty"], "1");
    (
        StatusCode::OK,
        Json(json!({
            "id": "order-1",
            "client_order_id": body["client_order_id"],
            "symbol": body["symbol"],
            "side": body["side"],
            "qty": body["qty"],
            "type": "market",
            "time_in_force": "day",
            "status": "accepted",
            "submitted_at": "2024-03-04T15:05:00Z"
        })),
    )
}

async fn spawn_mock() -> String {
    let app = Router::new()
        .route("/v2/assets", get(assets))
        .route("/v2/stocks/:symbol/bars", get(bars))
        .route("/v2/account", get(account))
        .route("/v2/orders", post(orders));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v2")
}

fn client(base: &str, key: &str) -> AlpacaClient {
    AlpacaClient::new(key, SECRET, base, base, "iex", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lists_only_tradable_equities() {
    let base = spawn_mock().await;
    let assets = client(&base, KEY).list_tradable_assets().await.unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].symbol, "AAPL");
}

#[tokio::test]
async fn bars_come_back_oldest_first() {
    let base = spawn_mock().await;
    let series = client(&base, KEY)
        .recent_bars("AAPL", Timeframe::OneMinute, 3)
        .await
        .unwrap();
    assert_eq!(series.symbol(), "AAPL");
    assert_eq!(series.closes().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let base = spawn_mock().await;
    let err = client(&base, KEY)
        .recent_bars("DOWN", Timeframe::OneMinute, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unavailable(ref m) if m.contains("maintenance")));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let base = spawn_mock().await;
    let err = client(&base, "wrong").account_snapshot().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn account_decimals_are_parsed() {
    let base = spawn_mock().await;
    let snapshot = client(&base, KEY).account_snapshot().await.unwrap();
    assert_eq!(snapshot.equity, 1000.50);
    assert_eq!(snapshot.cash, 800.25);
}

#[tokio::test]
async fn order_round_trip() {
    let base = spawn_mock().await;
    let intent = TradeIntent::market("AAPL", OrderSide::Buy, 1);
    let confirmation = client(&base, KEY).submit_order(&intent).await.unwrap();
    assert_eq!(confirmation.order_id, "order-1");
    assert_eq!(confirmation.client_order_id, intent.client_order_id);
    assert_eq!(confirmation.side, OrderSide::Buy);
    assert_eq!(confirmation.quantity, 1);
    assert_eq!(confirmation.status, "accepted");
}

#[tokio::test]
async fn insufficient_buying_power_is_a_rejection() {
    let base = spawn_mock().await;
    let intent = TradeIntent::market("POOR", OrderSide::Buy, 1);
    let err = client(&base, KEY).submit_order(&intent).await.unwrap_err();
    assert!(matches!(err, Error::OrderRejected { ref symbol, .. } if symbol == "POOR"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_host_is_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}/v2"), KEY)
        .list_tradable_assets()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
}
