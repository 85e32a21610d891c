use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

use common::{
    Asset, BarSeries, Config, Error, ExecutionReport, FailureStage, MarketDataSource, OrderSink,
    Result, SymbolOutcome, SymbolReport, Timeframe, TradeIntent,
};
use strategy::{Strategy, StrategyConfig};

/// Knobs for one orchestration run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub timeframe: Timeframe,
    /// Bars requested per symbol.
    pub lookback: usize,
    /// Shares per order.
    pub quantity: u32,
    /// Upper bound on every data-source and order-sink call.
    pub call_timeout: Duration,
    /// Extra attempts for `Unavailable` bar fetches.
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_backoff: Duration,
    /// Symbols in flight at once. 1 means strictly sequential.
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::OneMinute,
            lookback: 50,
            quantity: 1,
            call_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            max_concurrency: 4,
        }
    }
}

impl OrchestratorConfig {
    pub fn new(cfg: &Config, strategy: &StrategyConfig) -> Self {
        Self {
            timeframe: strategy.timeframe,
            lookback: strategy.lookback,
            quantity: strategy.quantity,
            call_timeout: cfg.request_timeout,
            max_retries: cfg.max_retries,
            max_concurrency: cfg.max_concurrency,
            ..Self::default()
        }
    }
}

/// Runs the strategy over a batch of assets and submits the resulting orders.
///
/// A failure for one symbol (fetch, indicators, or order) is recorded in the
/// report and the batch carries on. Only a failed asset listing in
/// `run_once` aborts the run.
pub struct Orchestrator {
    source: Arc<dyn MarketDataSource>,
    sink: Arc<dyn OrderSink>,
    strategy: Arc<dyn Strategy>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        sink: Arc<dyn OrderSink>,
        strategy: Arc<dyn Strategy>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            sink,
            strategy,
            config,
        }
    }

    /// Tradable assets, bounded by the call timeout.
    pub async fn tradable_assets(&self) -> Result<Vec<Asset>> {
        with_timeout(self.config.call_timeout, self.source.list_tradable_assets()).await
    }

    /// Account profit/loss, bounded by the call timeout.
    pub async fn profit_loss(&self) -> Result<f64> {
        with_timeout(
            self.config.call_timeout,
            crate::pnl::profit_loss(self.source.as_ref()),
        )
        .await
    }

    /// List tradable assets, then run over all of them.
    pub async fn run_once(&self) -> Result<ExecutionReport> {
        let assets = self.tradable_assets().await.map_err(|e| {
            error!(error = %e, "Asset listing failed, aborting run");
            e
        })?;
        Ok(self.run(&assets).await)
    }

    /// Evaluate every asset and submit orders for buy/sell decisions.
    /// The report holds one entry per asset, in the order given.
    pub async fn run(&self, assets: &[Asset]) -> ExecutionReport {
        let started_at = Utc::now();
        info!(
            assets = assets.len(),
            strategy = self.strategy.name(),
            "Trading run started"
        );

        // Futures are built up front so the stream holds no borrowing closure,
        // which keeps the returned future `Send` for axum handlers.
        // `buffered` keeps input order regardless of which symbol finishes first.
        let pending: Vec<_> = assets
            .iter()
            .map(|asset| self.process(&asset.symbol))
            .collect();
        let symbols: Vec<SymbolReport> = stream::iter(pending)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let report = ExecutionReport {
            started_at,
            finished_at: Utc::now(),
            symbols,
        };
        info!(
            ordered = report.ordered(),
            held = report.held(),
            failed = report.failed(),
            "Trading run finished"
        );
        report
    }

    async fn process(&self, symbol: &str) -> SymbolReport {
        let outcome = match self.process_inner(symbol).await {
            Ok(outcome) => outcome,
            Err((stage, e)) => {
                warn!(%symbol, ?stage, error = %e, "Symbol failed");
                SymbolOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        };
        SymbolReport {
            symbol: symbol.to_string(),
            outcome,
        }
    }

    async fn process_inner(
        &self,
        symbol: &str,
    ) -> std::result::Result<SymbolOutcome, (FailureStage, Error)> {
        let series = self
            .fetch_bars(symbol)
            .await
            .map_err(|e| (FailureStage::FetchBars, e))?;

        let eval = self
            .strategy
            .evaluate(&series)
            .map_err(|e| (FailureStage::Indicators, e))?;

        info!(
            %symbol,
            price = eval.last_price,
            sma = eval.snapshot.sma,
            rsi = eval.snapshot.rsi,
            decision = %eval.decision,
            "Evaluated"
        );

        let Some(side) = eval.decision.side() else {
            return Ok(SymbolOutcome::Held {
                snapshot: eval.snapshot,
            });
        };

        let intent = TradeIntent::market(symbol, side, self.config.quantity);
        // Orders are never retried: a timed-out submission may still have landed.
        let confirmation = with_timeout(self.config.call_timeout, self.sink.submit_order(&intent))
            .await
            .map_err(|e| (FailureStage::SubmitOrder, e))?;

        info!(
            %symbol,
            %side,
            qty = intent.quantity,
            order_id = %confirmation.order_id,
            "Order placed"
        );
        Ok(SymbolOutcome::Ordered {
            snapshot: eval.snapshot,
            decision: eval.decision,
            confirmation,
        })
    }

    async fn fetch_bars(&self, symbol: &str) -> Result<BarSeries> {
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0;
        loop {
            let result = with_timeout(
                self.config.call_timeout,
                self.source
                    .recent_bars(symbol, self.config.timeframe, self.config.lookback),
            )
            .await;

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(%symbol, attempt, backoff = ?backoff, error = %e, "Bar fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(Error::Timeout(limit)))
}
