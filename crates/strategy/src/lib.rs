pub mod config;
pub mod indicators;
pub mod signal;

pub use config::StrategyConfig;
pub use indicators::{compute_rsi, compute_sma, RsiIndicator, SmaIndicator};
pub use signal::{SignalEvaluator, SignalThresholds};

use common::{BarSeries, Decision, Error, IndicatorSnapshot, Result};

/// Indicator values plus the decision they lead to.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub snapshot: IndicatorSnapshot,
    pub last_price: f64,
    pub decision: Decision,
}

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Minimum number of bars `evaluate` needs to succeed.
    fn required_bars(&self) -> usize;

    /// Compute indicators over `series` and classify the latest bar.
    fn evaluate(&self, series: &BarSeries) -> Result<Evaluation>;
}

/// SMA + RSI mean reversion: buy weakness below the average, sell strength
/// above it.
#[derive(Debug, Clone)]
pub struct SmaRsiStrategy {
    name: String,
    sma: SmaIndicator,
    rsi: RsiIndicator,
    evaluator: SignalEvaluator,
}

impl SmaRsiStrategy {
    pub fn new(sma_window: usize, rsi_window: usize, thresholds: SignalThresholds) -> Self {
        Self {
            name: format!("SMA({sma_window})/RSI({rsi_window})"),
            sma: SmaIndicator::new(sma_window),
            rsi: RsiIndicator::new(rsi_window),
            evaluator: SignalEvaluator::new(thresholds),
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(cfg.sma_window, cfg.rsi_window, cfg.thresholds())
    }
}

impl Default for SmaRsiStrategy {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl Strategy for SmaRsiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_bars(&self) -> usize {
        // RSI works on whatever is available; only the SMA has a hard floor.
        self.sma.window
    }

    fn evaluate(&self, series: &BarSeries) -> Result<Evaluation> {
        let last = series.last().ok_or(Error::InsufficientData {
            required: self.required_bars(),
            available: 0,
        })?;
        let sma = self.sma.compute(series)?;
        let rsi = self.rsi.compute(series)?;
        let decision = self.evaluator.evaluate(last.close, sma, rsi);

        Ok(Evaluation {
            snapshot: IndicatorSnapshot {
                symbol: series.symbol().to_string(),
                sma,
                rsi,
                as_of: last.timestamp,
            },
            last_price: last.close,
            decision,
        })
    }
}
