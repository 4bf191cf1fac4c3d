// src/config.rs
use crate::error::AppError;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub default_symbol: String,
}

impl Config {
    /// Reads the configuration from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("API_KEY is not set".to_string()))?;

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| AppError::Config(format!("invalid BIND_ADDR '{}': {}", raw, e)))?,
            None => SocketAddr::from(([127, 0, 0, 1], 3030)),
        };

        let tick_ms = parse_number(&lookup, "TICK_INTERVAL_MS", 2000)?;
        let timeout_secs = parse_number(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        if tick_ms == 0 {
            return Err(AppError::Config(
                "TICK_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            api_key,
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            bind_addr,
            tick_interval: Duration::from_millis(tick_ms),
            request_timeout: Duration::from_secs(timeout_secs),
            default_symbol: lookup("DEFAULT_SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "AAPL".to_string()),
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
