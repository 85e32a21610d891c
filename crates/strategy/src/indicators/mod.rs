pub mod rsi;
pub mod sma;

pub use rsi::{compute_rsi, RsiIndicator, DEFAULT_RSI_WINDOW};
pub use sma::{compute_sma, SmaIndicator, DEFAULT_SMA_WINDOW};
