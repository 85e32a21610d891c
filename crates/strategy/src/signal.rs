use serde::{Deserialize, Serialize};

use common::Decision;

/// RSI bounds for the mean-reversion rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Buy only when RSI is strictly below this.
    pub oversold: f64,
    /// Sell only when RSI is strictly above this.
    pub overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// Stateless price/SMA/RSI classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEvaluator {
    pub thresholds: SignalThresholds,
}

impl SignalEvaluator {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    /// Buy below the SMA when oversold, sell above it when overbought,
    /// hold otherwise. Comparisons are strict on both sides.
    pub fn evaluate(&self, last_price: f64, sma: f64, rsi: f64) -> Decision {
        if last_price < sma && rsi < self.thresholds.oversold {
            Decision::Buy
        } else if last_price > sma && rsi > self.thresholds.overbought {
            Decision::Sell
        } else {
            Decision::Hold
        }
    }
}
