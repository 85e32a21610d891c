use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Asset class string the bot trades. Everything else is filtered out by the
/// data source before it reaches the orchestrator.
pub const US_EQUITY: &str = "us_equity";

/// One OHLCV sample for a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars for a single symbol, oldest first. Timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series, rejecting out-of-order or duplicate timestamps.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        let symbol = symbol.into();
        if let Some(w) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(Error::InvalidData(format!(
                "{symbol}: bar at {} does not follow {}",
                w[1].timestamp, w[0].timestamp
            )));
        }
        Ok(Self { symbol, bars })
    }

    /// Flat bars (open = high = low = close) spaced `interval` apart, starting
    /// at `start`. Used by the simulator and by tests.
    pub fn from_closes(
        symbol: impl Into<String>,
        start: DateTime<Utc>,
        interval: chrono::Duration,
        closes: &[f64],
    ) -> Result<Self> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + interval * i as i32,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The most recent `n` bars (all of them if the series is shorter).
    pub fn tail(&self, n: usize) -> &[Bar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }
}

/// Tradable instrument as listed by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub tradable: bool,
    #[serde(rename = "class")]
    pub asset_class: String,
}

impl Asset {
    pub fn us_equity(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: String::new(),
            tradable: true,
            asset_class: US_EQUITY.to_string(),
        }
    }

    pub fn is_tradable_equity(&self) -> bool {
        self.tradable && self.asset_class == US_EQUITY
    }
}

/// Bar interval, spelled the way Alpaca's data API expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    #[default]
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1Min",
            Timeframe::FiveMinutes => "5Min",
            Timeframe::FifteenMinutes => "15Min",
            Timeframe::OneHour => "1Hour",
            Timeframe::OneDay => "1Day",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1Min" => Ok(Timeframe::OneMinute),
            "5Min" => Ok(Timeframe::FiveMinutes),
            "15Min" => Ok(Timeframe::FifteenMinutes),
            "1Hour" => Ok(Timeframe::OneHour),
            "1Day" => Ok(Timeframe::OneDay),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Valid for the current trading session only.
    Day,
    Gtc,
}

/// A proposed order, produced from a buy/sell decision and handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
}

impl TradeIntent {
    /// Market order valid for the day.
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Acknowledgement returned by the order sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

/// Point-in-time account balances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub cash: f64,
}

impl AccountSnapshot {
    pub fn profit_loss(&self) -> f64 {
        self.equity - self.cash
    }
}

/// Indicator values computed for one symbol in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub sma: f64,
    pub rsi: f64,
    pub as_of: DateTime<Utc>,
}

/// Outcome of the signal evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    /// Order side for actionable decisions; `None` for hold.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Decision::Buy => Some(OrderSide::Buy),
            Decision::Sell => Some(OrderSide::Sell),
            Decision::Hold => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Buy => write!(f, "buy"),
            Decision::Sell => write!(f, "sell"),
            Decision::Hold => write!(f, "hold"),
        }
    }
}

/// Pipeline step at which a symbol failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    FetchBars,
    Indicators,
    SubmitOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Ordered {
        snapshot: IndicatorSnapshot,
        decision: Decision,
        confirmation: OrderConfirmation,
    },
    Held {
        snapshot: IndicatorSnapshot,
    },
    Failed {
        stage: FailureStage,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Per-symbol results of one orchestration run, in the order assets were given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub symbols: Vec<SymbolReport>,
}

impl ExecutionReport {
    pub fn ordered(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Ordered { .. }))
    }

    pub fn held(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Held { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Failed { .. }))
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
        self.symbols.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Which broker the bot talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Alpaca live account.
    Live,
    /// Alpaca paper-trading account.
    Paper,
    /// In-process simulated broker, no network.
    Simulated,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
            TradingMode::Simulated => write!(f, "simulated"),
        }
    }
}

/// Trading session state. Only `Running` accepts trading requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Waiting,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Waiting => write!(f, "waiting"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    PreOpen,
    Start,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(minute: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 15, minute, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let err = BarSeries::new("AAPL", vec![bar(1, 1.0), bar(1, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn series_rejects_descending_timestamps() {
        assert!(BarSeries::new("AAPL", vec![bar(2, 1.0), bar(1, 2.0)]).is_err());
    }

    #[test]
    fn tail_clamps_to_series_length() {
        let series = BarSeries::new("AAPL", vec![bar(1, 1.0), bar(2, 2.0), bar(3, 3.0)]).unwrap();
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(2)[0].close, 2.0);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn asset_deserializes_alpaca_class_field() {
        let json = r#"{"id":"x","class":"us_equity","symbol":"AAPL","name":"Apple Inc.","tradable":true,"status":"active"}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.symbol, "AAPL");
        assert!(asset.is_tradable_equity());
    }

    #[test]
    fn non_equity_or_untradable_assets_are_filtered() {
        let mut crypto = Asset::us_equity("BTC/USD");
        crypto.asset_class = "crypto".into();
        assert!(!crypto.is_tradable_equity());

        let mut halted = Asset::us_equity("XYZ");
        halted.tradable = false;
        assert!(!halted.is_tradable_equity());
    }

    #[test]
    fn timeframe_uses_alpaca_spelling() {
        assert_eq!(Timeframe::default().to_string(), "1Min");
        assert_eq!("1Hour".parse::<Timeframe>().unwrap(), Timeframe::OneHour);
        assert!("1m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn market_intent_is_day_order() {
        let intent = TradeIntent::market("AAPL", OrderSide::Buy, 1);
        assert_eq!(intent.order_type, OrderType::Market);
        assert_eq!(intent.time_in_force, TimeInForce::Day);
        assert!(!intent.client_order_id.is_empty());
    }

    #[test]
    fn profit_loss_is_equity_minus_cash() {
        let snapshot = AccountSnapshot { equity: 1000.0, cash: 800.0 };
        assert_eq!(snapshot.profit_loss(), 200.0);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = SymbolOutcome::Failed {
            stage: FailureStage::FetchBars,
            error: "boom".into(),
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["stage"], "fetch_bars");
    }
}
