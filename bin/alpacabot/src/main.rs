use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, EngineCommand, MarketDataSource, OrderSink, TradingMode};
use engine::{
    AlpacaClient, Engine, Orchestrator, OrchestratorConfig, SessionSchedule, SessionScheduler,
    SystemClock,
};
use paper::PaperClient;
use strategy::{SmaRsiStrategy, Strategy, StrategyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    let strategy_cfg = StrategyConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading strategy config '{}'", cfg.strategy_config_path))?;
    info!(mode = %cfg.trading_mode, port = cfg.port, "AlpacaBot starting");

    // ── Broker (injected based on TRADING_MODE) ───────────────────────────────
    let (source, sink): (Arc<dyn MarketDataSource>, Arc<dyn OrderSink>) = match cfg.trading_mode {
        TradingMode::Live | TradingMode::Paper => {
            info!(url = %cfg.trading_url, "Using Alpaca REST API");
            let client = Arc::new(AlpacaClient::from_config(&cfg)?);
            (client.clone() as Arc<dyn MarketDataSource>, client as Arc<dyn OrderSink>)
        }
        TradingMode::Simulated => {
            info!("Simulated mode, using in-process PaperClient");
            let client = Arc::new(PaperClient::demo()?);
            (client.clone() as Arc<dyn MarketDataSource>, client as Arc<dyn OrderSink>)
        }
    };

    // ── Strategy + orchestrator ───────────────────────────────────────────────
    let strategy = SmaRsiStrategy::from_config(&strategy_cfg);
    info!(
        strategy = strategy.name(),
        timeframe = %strategy_cfg.timeframe,
        lookback = strategy_cfg.lookback,
        "Strategy loaded"
    );
    let orchestrator = Orchestrator::new(
        source,
        sink,
        Arc::new(strategy),
        OrchestratorConfig::new(&cfg, &strategy_cfg),
    );

    // ── Session lifecycle ─────────────────────────────────────────────────────
    let (engine, engine_handle) = Engine::new();
    tokio::spawn(engine.run());

    if cfg.session_gating {
        let scheduler = SessionScheduler::new(
            SessionSchedule::default(),
            Arc::new(SystemClock),
            engine_handle.clone(),
        );
        tokio::spawn(scheduler.run());
    } else {
        info!("Session gating disabled, trading routes always open");
        engine_handle.send(EngineCommand::Start).await;
    }

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        engine: engine_handle,
        orchestrator: Arc::new(orchestrator),
        trading_mode: cfg.trading_mode,
        session_gating: cfg.session_gating,
    };
    let server = tokio::spawn(api::serve(api_state, cfg.port));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::select! {
        res = server => {
            res.context("HTTP server task panicked")?
                .context("HTTP server failed")?;
        }
        res = tokio::signal::ctrl_c() => {
            res.context("listening for shutdown signal")?;
            info!("Shutdown signal received. Exiting.");
        }
    }
    Ok(())
}
