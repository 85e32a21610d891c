use common::{BarSeries, Error, Result};

/// Default SMA window in bars.
pub const DEFAULT_SMA_WINDOW: usize = 10;

/// Simple moving average of closing prices.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub window: usize,
}

impl SmaIndicator {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "SMA window must be >= 1");
        Self { window }
    }

    /// Mean close of the most recent `window` bars.
    /// Fails with `InsufficientData` if the series is shorter than the window.
    pub fn compute(&self, series: &BarSeries) -> Result<f64> {
        compute_sma(series, self.window)
    }
}

impl Default for SmaIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_SMA_WINDOW)
    }
}

pub fn compute_sma(series: &BarSeries, window: usize) -> Result<f64> {
    if window == 0 || series.len() < window {
        return Err(Error::InsufficientData {
            required: window.max(1),
            available: series.len(),
        });
    }
    let sum: f64 = series.tail(window).iter().map(|b| b.close).sum();
    Ok(sum / window as f64)
}
