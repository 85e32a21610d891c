use async_trait::async_trait;

use crate::{AccountSnapshot, Asset, BarSeries, OrderConfirmation, Result, Timeframe, TradeIntent};

/// Read side of the broker connection.
///
/// `AlpacaClient` implements this against the REST API.
/// `PaperClient` implements this for offline simulation and tests.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Assets that are tradable US equities. Filtering happens here so the
    /// orchestrator never sees anything else.
    async fn list_tradable_assets(&self) -> Result<Vec<Asset>>;

    /// The most recent `limit` bars for `symbol`, oldest first.
    async fn recent_bars(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<BarSeries>;

    /// Current equity and cash.
    async fn account_snapshot(&self) -> Result<AccountSnapshot>;
}

/// Write side of the broker connection.
///
/// Only the trading orchestrator in `crates/engine` submits orders.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderConfirmation>;
}

/// Convenience for adapters that hand back every listed asset.
pub fn retain_tradable_equities(assets: Vec<Asset>) -> Vec<Asset> {
    assets.into_iter().filter(Asset::is_tradable_equity).collect()
}
