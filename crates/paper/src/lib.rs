use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AccountSnapshot, Asset, BarSeries, Error, MarketDataSource, OrderConfirmation, OrderSide,
    OrderSink, Result, Timeframe, TradeIntent,
};

/// Simulated broker for offline runs and tests.
///
/// Fills are simulated at the last close of the symbol's seeded bars.
/// No request ever leaves the process.
pub struct PaperClient {
    assets: Arc<RwLock<Vec<Asset>>>,
    bars: Arc<RwLock<HashMap<String, BarSeries>>>,
    /// Simulated cash balance in USD.
    cash: Arc<RwLock<f64>>,
    /// Shares held per symbol.
    positions: Arc<RwLock<HashMap<String, u32>>>,
    /// Symbols whose bar requests fail with `Unavailable`.
    failing: Arc<RwLock<HashSet<String>>>,
    orders: Arc<RwLock<Vec<TradeIntent>>>,
}

impl PaperClient {
    pub fn new(initial_cash: f64) -> Self {
        info!(cash = initial_cash, "PaperClient initialized");
        Self {
            assets: Arc::new(RwLock::new(Vec::new())),
            bars: Arc::new(RwLock::new(HashMap::new())),
            cash: Arc::new(RwLock::new(initial_cash)),
            positions: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            orders: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Three symbols with deterministic minute bars: one sliding, one
    /// rallying, one flat. Enough to exercise buy, sell and hold offline.
    pub fn demo() -> Result<Self> {
        let client = Self::new(100_000.0);
        let start = Utc
            .with_ymd_and_hms(2024, 3, 4, 15, 0, 0)
            .single()
            .ok_or_else(|| Error::InvalidData("bad demo start".into()))?;
        let minute = Duration::minutes(1);

        let mut slide: Vec<f64> = (0..48).map(|i| 180.0 + i as f64 * 0.05).collect();
        slide.extend([176.0, 171.0]);
        let rally: Vec<f64> = (0..50).map(|i| 400.0 + i as f64 * 3.0).collect();
        let flat = vec![250.0; 50];

        let seeded = [("AAPL", slide), ("MSFT", rally), ("TSLA", flat)];
        {
            let mut assets = client.assets.try_write().map_err(lock_error)?;
            let mut bars = client.bars.try_write().map_err(lock_error)?;
            for (symbol, closes) in seeded {
                assets.push(Asset::us_equity(symbol));
                bars.insert(
                    symbol.to_string(),
                    BarSeries::from_closes(symbol, start, minute, &closes)?,
                );
            }
        }
        // Hold some MSFT so the sell signal can fill.
        client
            .positions
            .try_write()
            .map_err(lock_error)?
            .insert("MSFT".to_string(), 5);
        Ok(client)
    }

    /// List an asset. Untradable or non-equity assets are stored but filtered
    /// out of `list_tradable_assets`, like the real broker.
    pub async fn add_asset(&self, asset: Asset) {
        self.assets.write().await.push(asset);
    }

    pub async fn set_bars(&self, series: BarSeries) {
        self.bars
            .write()
            .await
            .insert(series.symbol().to_string(), series);
    }

    pub async fn set_position(&self, symbol: &str, shares: u32) {
        self.positions.write().await.insert(symbol.to_string(), shares);
    }

    /// Make bar requests for `symbol` fail with `Unavailable`.
    pub async fn fail_bars_for(&self, symbol: &str) {
        self.failing.write().await.insert(symbol.to_string());
    }

    /// Every order accepted so far, oldest first.
    pub async fn submitted_orders(&self) -> Vec<TradeIntent> {
        self.orders.read().await.clone()
    }

    async fn last_close(&self, symbol: &str) -> Option<f64> {
        self.bars
            .read()
            .await
            .get(symbol)
            .and_then(|s| s.last())
            .map(|b| b.close)
    }
}

fn lock_error(e: tokio::sync::TryLockError) -> Error {
    Error::InvalidData(format!("paper broker state busy: {e}"))
}

#[async_trait]
impl MarketDataSource for PaperClient {
    async fn list_tradable_assets(&self) -> Result<Vec<Asset>> {
        Ok(common::broker::retain_tradable_equities(
            self.assets.read().await.clone(),
        ))
    }

    async fn recent_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<BarSeries> {
        if self.failing.read().await.contains(symbol) {
            return Err(Error::Unavailable(format!(
                "simulated outage fetching bars for {symbol}"
            )));
        }
        match self.bars.read().await.get(symbol) {
            Some(series) => BarSeries::new(symbol, series.tail(limit).to_vec()),
            None => BarSeries::new(symbol, Vec::new()),
        }
    }

    async fn account_snapshot(&self) -> Result<AccountSnapshot> {
        let cash = *self.cash.read().await;
        let positions = self.positions.read().await.clone();
        let mut market_value = 0.0;
        for (symbol, shares) in positions {
            market_value += self.last_close(&symbol).await.unwrap_or(0.0) * shares as f64;
        }
        Ok(AccountSnapshot {
            equity: cash + market_value,
            cash,
        })
    }
}

#[async_trait]
impl OrderSink for PaperClient {
    async fn submit_order(&self, intent: &TradeIntent) -> Result<OrderConfirmation> {
        let reject = |reason: String| Error::OrderRejected {
            symbol: intent.symbol.clone(),
            reason,
        };

        let price = self
            .last_close(&intent.symbol)
            .await
            .ok_or_else(|| reject("no price available".into()))?;
        let notional = price * intent.quantity as f64;

        let mut cash = self.cash.write().await;
        let mut positions = self.positions.write().await;
        let held = positions.get(&intent.symbol).copied().unwrap_or(0);

        match intent.side {
            OrderSide::Buy => {
                if notional > *cash {
                    return Err(reject(format!(
                        "insufficient buying power: need {notional:.2}, have {:.2}",
                        *cash
                    )));
                }
                *cash -= notional;
                positions.insert(intent.symbol.clone(), held + intent.quantity);
            }
            OrderSide::Sell => {
                if held < intent.quantity {
                    return Err(reject(format!(
                        "insufficient position: hold {held}, selling {}",
                        intent.quantity
                    )));
                }
                *cash += notional;
                positions.insert(intent.symbol.clone(), held - intent.quantity);
            }
        }
        drop(positions);
        drop(cash);

        debug!(
            symbol = %intent.symbol,
            side = %intent.side,
            price,
            qty = intent.quantity,
            "Paper fill simulated"
        );
        self.orders.write().await.push(intent.clone());

        Ok(OrderConfirmation {
            order_id: uuid::Uuid::new_v4().to_string(),
            client_order_id: intent.client_order_id.clone(),
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            status: "filled".to_string(),
            submitted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(symbol: &str, closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        BarSeries::from_closes(symbol, start, Duration::minutes(1), closes).unwrap()
    }

    #[tokio::test]
    async fn buy_debits_cash_at_last_close() {
        let client = PaperClient::new(1_000.0);
        client.set_bars(series("AAPL", &[99.0, 100.0])).await;

        let intent = TradeIntent::market("AAPL", OrderSide::Buy, 2);
        let confirmation = client.submit_order(&intent).await.unwrap();
        assert_eq!(confirmation.client_order_id, intent.client_order_id);
        assert_eq!(confirmation.status, "filled");

        let account = client.account_snapshot().await.unwrap();
        assert_eq!(account.cash, 800.0);
        assert_eq!(account.equity, 1_000.0);
        assert_eq!(account.profit_loss(), 200.0);
    }

    #[tokio::test]
    async fn sell_without_position_is_rejected() {
        let client = PaperClient::new(1_000.0);
        client.set_bars(series("AAPL", &[100.0])).await;

        let err = client
            .submit_order(&TradeIntent::market("AAPL", OrderSide::Sell, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OrderRejected { .. }));
        assert!(client.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn buy_beyond_cash_is_rejected() {
        let client = PaperClient::new(50.0);
        client.set_bars(series("AAPL", &[100.0])).await;
        let err = client
            .submit_order(&TradeIntent::market("AAPL", OrderSide::Buy, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insufficient buying power"));
    }

    #[tokio::test]
    async fn listing_filters_untradable_and_non_equity() {
        let client = PaperClient::new(0.0);
        client.add_asset(Asset::us_equity("AAPL")).await;
        let mut halted = Asset::us_equity("HALT");
        halted.tradable = false;
        client.add_asset(halted).await;
        let mut coin = Asset::us_equity("BTC/USD");
        coin.asset_class = "crypto".into();
        client.add_asset(coin).await;

        let assets = client.list_tradable_assets().await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn recent_bars_respects_limit_and_failures() {
        let client = PaperClient::new(0.0);
        client.set_bars(series("AAPL", &[1.0, 2.0, 3.0, 4.0])).await;

        let s = client.recent_bars("AAPL", Timeframe::OneMinute, 2).await.unwrap();
        assert_eq!(s.closes().collect::<Vec<_>>(), vec![3.0, 4.0]);

        let unknown = client.recent_bars("NOPE", Timeframe::OneMinute, 2).await.unwrap();
        assert!(unknown.is_empty());

        client.fail_bars_for("AAPL").await;
        let err = client.recent_bars("AAPL", Timeframe::OneMinute, 2).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn demo_seeds_three_symbols() {
        let client = PaperClient::demo().unwrap();
        let assets = client.list_tradable_assets().await.unwrap();
        assert_eq!(assets.len(), 3);
        let bars = client.recent_bars("AAPL", Timeframe::OneMinute, 50).await.unwrap();
        assert_eq!(bars.len(), 50);
        let account = client.account_snapshot().await.unwrap();
        assert!(account.profit_loss() > 0.0);
    }
}
