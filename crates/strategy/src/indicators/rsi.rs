use common::{BarSeries, Error, Result};

/// Default RSI window in bars.
pub const DEFAULT_RSI_WINDOW: usize = 50;

/// Substituted for the average gain or loss when that side has no deltas.
/// Keeps the ratio finite; a flat or single-bar window comes out at exactly 50.
const EMPTY_SIDE_AVERAGE: f64 = 1.0;

/// RSI (Relative Strength Index) indicator.
///
/// Averages are plain means over the window, not Wilder-smoothed: gains are
/// the positive close-to-close deltas, losses the magnitudes of the negative
/// ones, and unchanged closes count toward neither side.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub window: usize,
}

impl RsiIndicator {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "RSI window must be >= 1");
        Self { window }
    }

    /// Compute RSI over the most recent `window` bars (all bars if the series
    /// is shorter). Fails only on an empty series.
    pub fn compute(&self, series: &BarSeries) -> Result<f64> {
        compute_rsi(series, self.window)
    }
}

impl Default for RsiIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_WINDOW)
    }
}

pub fn compute_rsi(series: &BarSeries, window: usize) -> Result<f64> {
    if series.is_empty() || window == 0 {
        return Err(Error::InsufficientData {
            required: 1,
            available: series.len(),
        });
    }

    let bars = series.tail(window);
    let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();

    let gains: Vec<f64> = changes.iter().copied().filter(|&c| c > 0.0).collect();
    let losses: Vec<f64> = changes
        .iter()
        .copied()
        .filter(|&c| c < 0.0)
        .map(f64::abs)
        .collect();

    let avg_gain = mean_or_fallback(&gains);
    let avg_loss = mean_or_fallback(&losses);

    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

fn mean_or_fallback(values: &[f64]) -> f64 {
    if values.is_empty() {
        EMPTY_SIDE_AVERAGE
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
