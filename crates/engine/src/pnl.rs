use common::{AccountSnapshot, MarketDataSource, Result};

/// Unrealized profit/loss: account equity minus cash.
pub fn compute_profit_loss(snapshot: &AccountSnapshot) -> f64 {
    snapshot.profit_loss()
}

/// Fetch the current account snapshot and derive profit/loss from it.
/// Data-source errors propagate unchanged.
pub async fn profit_loss(source: &dyn MarketDataSource) -> Result<f64> {
    let snapshot = source.account_snapshot().await?;
    Ok(compute_profit_loss(&snapshot))
}
