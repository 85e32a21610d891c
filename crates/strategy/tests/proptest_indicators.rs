use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::BarSeries;
use strategy::{compute_rsi, compute_sma};

fn series(closes: &[f64]) -> BarSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
    BarSeries::from_closes("PROP", start, Duration::minutes(1), closes).unwrap()
}

proptest! {
    /// SMA is the mean of the last `window` closes, taken in series order.
    #[test]
    fn sma_matches_mean_of_tail(
        closes in prop::collection::vec(0.01f64..10_000.0, 1..120),
        window in 1usize..60,
    ) {
        let s = series(&closes);
        match compute_sma(&s, window) {
            Ok(value) => {
                prop_assert!(closes.len() >= window);
                let tail = &closes[closes.len() - window..];
                let expected = tail.iter().sum::<f64>() / window as f64;
                prop_assert!((value - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            }
            Err(_) => prop_assert!(closes.len() < window),
        }
    }

    /// RSI stays inside [0, 100] and never fails on a non-empty series.
    #[test]
    fn rsi_is_bounded(
        closes in prop::collection::vec(0.01f64..10_000.0, 1..120),
        window in 1usize..80,
    ) {
        let value = compute_rsi(&series(&closes), window).unwrap();
        prop_assert!(value.is_finite());
        prop_assert!((0.0..=100.0).contains(&value), "RSI out of range: {}", value);
    }

    /// Shifting every close by a constant leaves the deltas, and so RSI, unchanged.
    #[test]
    fn rsi_ignores_price_level(
        closes in prop::collection::vec(1.0f64..1_000.0, 2..60),
        shift in 0.0f64..1_000.0,
    ) {
        let shifted: Vec<f64> = closes.iter().map(|c| c + shift).collect();
        let a = compute_rsi(&series(&closes), 50).unwrap();
        let b = compute_rsi(&series(&shifted), 50).unwrap();
        prop_assert!((a - b).abs() < 1e-6);
    }
}
