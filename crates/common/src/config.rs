use std::time::Duration;

use url::Url;

use crate::{Error, Result, TradingMode};

pub const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets/v2";
pub const LIVE_TRADING_URL: &str = "https://api.alpaca.markets/v2";
pub const DATA_URL: &str = "https://data.alpaca.markets/v2";

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Broker
    pub trading_mode: TradingMode,
    pub api_key_id: String,
    pub api_secret_key: String,
    pub trading_url: String,
    pub data_url: String,
    pub data_feed: String,

    // HTTP server
    pub port: u16,
    /// When false the trading routes stay open outside market hours.
    pub session_gating: bool,

    // Orchestration
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub max_concurrency: usize,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trading_mode = match lookup("TRADING_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            "simulated" => TradingMode::Simulated,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper', 'live' or 'simulated', got: '{other}'"
                )))
            }
        };

        // Credentials are only needed when talking to Alpaca.
        let credential = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ if trading_mode == TradingMode::Simulated => Ok(String::new()),
                _ => Err(Error::Config(format!(
                    "required environment variable '{key}' is not set"
                ))),
            }
        };

        let default_trading_url = match trading_mode {
            TradingMode::Live => LIVE_TRADING_URL,
            TradingMode::Paper | TradingMode::Simulated => PAPER_TRADING_URL,
        };

        Ok(Config {
            api_key_id: credential("APCA_API_KEY_ID")?,
            api_secret_key: credential("APCA_API_SECRET_KEY")?,
            trading_url: base_url(
                "ALPACA_TRADING_URL",
                lookup("ALPACA_TRADING_URL"),
                default_trading_url,
            )?,
            data_url: base_url("ALPACA_DATA_URL", lookup("ALPACA_DATA_URL"), DATA_URL)?,
            data_feed: lookup("ALPACA_DATA_FEED").unwrap_or_else(|| "iex".to_string()),
            trading_mode,
            port: parsed("PORT", lookup("PORT"), 5000)?,
            session_gating: parsed("SESSION_GATING", lookup("SESSION_GATING"), true)?,
            request_timeout: Duration::from_secs(parsed(
                "REQUEST_TIMEOUT_SECS",
                lookup("REQUEST_TIMEOUT_SECS"),
                10,
            )?),
            max_retries: parsed("MAX_RETRIES", lookup("MAX_RETRIES"), 2)?,
            max_concurrency: parsed("MAX_CONCURRENCY", lookup("MAX_CONCURRENCY"), 4usize)?
                .max(1),
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
        })
    }
}

fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{v}'"))),
    }
}

/// Validate a base URL and strip any trailing slash so paths can be appended.
fn base_url(key: &str, raw: Option<String>, default: &str) -> Result<String> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|e| Error::Config(format!("{key} '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{key} must be an http(s) URL, got '{raw}'")));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
