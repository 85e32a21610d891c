use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result, Timeframe};

use crate::indicators::{DEFAULT_RSI_WINDOW, DEFAULT_SMA_WINDOW};
use crate::signal::SignalThresholds;

/// Strategy parameters, loaded from TOML.
///
/// Example `config/strategy.toml`:
/// ```toml
/// sma_window = 10
/// rsi_window = 50
/// oversold = 30.0
/// overbought = 70.0
/// quantity = 1
/// timeframe = "1Min"
/// lookback = 50
/// ```
/// Every key is optional; omitted keys take the values shown.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    pub sma_window: usize,
    pub rsi_window: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Shares per order.
    pub quantity: u32,
    /// Bar interval requested from the data source.
    pub timeframe: Timeframe,
    /// Number of bars requested per symbol.
    pub lookback: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let thresholds = SignalThresholds::default();
        Self {
            sma_window: DEFAULT_SMA_WINDOW,
            rsi_window: DEFAULT_RSI_WINDOW,
            oversold: thresholds.oversold,
            overbought: thresholds.overbought,
            quantity: 1,
            timeframe: Timeframe::OneMinute,
            lookback: 50,
        }
    }
}

impl StrategyConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No strategy config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sma_window == 0 || self.rsi_window == 0 {
            return Err(Error::Config("indicator windows must be >= 1".into()));
        }
        if self.quantity == 0 {
            return Err(Error::Config("quantity must be >= 1".into()));
        }
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.oversold) || !in_range(self.overbought) {
            return Err(Error::Config("RSI thresholds must lie within [0, 100]".into()));
        }
        if self.oversold >= self.overbought {
            return Err(Error::Config(format!(
                "oversold ({}) must be below overbought ({})",
                self.oversold, self.overbought
            )));
        }
        if self.lookback < self.sma_window {
            return Err(Error::Config(format!(
                "lookback ({}) must cover the SMA window ({})",
                self.lookback, self.sma_window
            )));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            oversold: self.oversold,
            overbought: self.overbought,
        }
    }
}
