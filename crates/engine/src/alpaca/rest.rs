use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use common::broker::retain_tradable_equities;
use common::{
    AccountSnapshot, Asset, Bar, BarSeries, Config, Error, MarketDataSource, OrderConfirmation,
    OrderSide, OrderSink, OrderType, Result, TimeInForce, Timeframe, TradeIntent,
};

/// REST client for Alpaca's trading and market-data APIs.
pub struct AlpacaClient {
    key_id: String,
    secret_key: String,
    trading_url: String,
    data_url: String,
    feed: String,
    http: Client,
}

impl AlpacaClient {
    pub fn new(
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
        trading_url: impl Into<String>,
        data_url: impl Into<String>,
        feed: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            trading_url: trading_url.into(),
            data_url: data_url.into(),
            feed: feed.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.api_key_id,
            &cfg.api_secret_key,
            &cfg.trading_url,
            &cfg.data_url,
            &cfg.data_feed,
            cfg.request_timeout,
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .authed(self.http.get(url).query(query))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(read_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| Error::InvalidData(format!("{url}: {e}")))
    }
}

#[async_trait]
impl MarketDataSource for AlpacaClient {
    async fn list_tradable_assets(&self) -> Result<Vec<Asset>> {
        let url = format!("{}/assets", self.trading_url);
        let query = [
            ("status", "active".to_string()),
            ("asset_class", common::US_EQUITY.to_string()),
        ];
        let assets: Vec<Asset> = self.get_json(&url, &query).await?;
        let total = assets.len();
        let tradable = retain_tradable_equities(assets);
        debug!(total, tradable = tradable.len(), "Fetched asset list");
        Ok(tradable)
    }

    async fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<BarSeries> {
        let url = format!("{}/stocks/{symbol}/bars", self.data_url);
        // Newest first so `limit` keeps the most recent bars; reversed below.
        let query = [
            ("timeframe", timeframe.to_string()),
            ("limit", limit.to_string()),
            ("sort", "desc".to_string()),
            ("feed", self.feed.clone()),
        ];
        let resp: BarsResponse = self.get_json(&url, &query).await?;

        let mut bars: Vec<Bar> = resp.bars.unwrap_or_default().into_iter().map(Bar::from).collect();
        bars.reverse();
        debug!(%symbol, count = bars.len(), "Fetched bars");
        BarSeries::new(symbol, bars)
    }

    async fn account_snapshot(&self) -> Result<AccountSnapshot> {
        let url = format!("{}/account", self.trading_url);
        let account: AccountResponse = self.get_json(&url, &[]).await?;
        Ok(AccountSnapshot {
            equity: parse_decimal("equity", &account.equity)?,
            cash: parse_decimal("cash", &account.cash)?,
        })
    }
}

#[async_trait]
impl OrderSink for AlpacaClient {
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderConfirmation> {
        let url = format!("{}/orders", self.trading_url);
        let body = OrderRequest {
            symbol: &intent.symbol,
            qty: intent.quantity.to_string(),
            side: intent.side,
            order_type: intent.order_type,
            time_in_force: intent.time_in_force,
            client_order_id: &intent.client_order_id,
        };

        debug!(symbol = %intent.symbol, side = %intent.side, "Submitting order to Alpaca");
        let resp = self
            .authed(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(order_error(&intent.symbol, status, &text));
        }

        let order: OrderResponse =
            serde_json::from_str(&text).map_err(|e| Error::InvalidData(e.to_string()))?;

        Ok(OrderConfirmation {
            order_id: order.id,
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
            quantity: order.qty.parse().unwrap_or(intent.quantity),
            status: order.status,
            submitted_at: order.submitted_at.unwrap_or_else(Utc::now),
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Unavailable(e.to_string())
}

/// Status mapping for read endpoints.
fn read_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Unauthorized(format!("HTTP {status}: {}", error_message(body)))
        }
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            Error::Unavailable(format!("HTTP {status}: {}", error_message(body)))
        }
        _ => Error::InvalidData(format!("HTTP {status}: {}", error_message(body))),
    }
}

/// Status mapping for order submission. Alpaca answers 403 when buying power
/// is insufficient, so only 401 means bad credentials here.
fn order_error(symbol: &str, status: StatusCode, body: &str) -> Error {
    let message = error_message(body);
    if status == StatusCode::UNAUTHORIZED {
        Error::Unauthorized(format!("HTTP {status}: {message}"))
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::Unavailable(format!("HTTP {status}: {message}"))
    } else {
        Error::OrderRejected {
            symbol: symbol.to_string(),
            reason: format!("HTTP {status}: {message}"),
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn parse_decimal(field: &str, raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| Error::InvalidData(format!("account {field} is not a number: '{raw}'")))
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct BarsResponse {
    // `null` when the symbol has no bars in range
    bars: Option<Vec<WireBar>>,
}

#[derive(Deserialize)]
struct WireBar {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: f64,
}

impl From<WireBar> for Bar {
    fn from(w: WireBar) -> Self {
        Bar {
            timestamp: w.timestamp,
            open: w.open,
            high: w.high,
            low: w.low,
            close: w.close,
            volume: w.volume,
        }
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    equity: String,
    cash: String,
}

#[derive(Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    time_in_force: TimeInForce,
    client_order_id: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    client_order_id: String,
    symbol: String,
    side: OrderSide,
    qty: String,
    status: String,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
