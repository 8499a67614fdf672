//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the market API token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. Every section has
//! defaults, so a missing file or section still yields a usable config.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::market::tibiamarket::DEFAULT_BASE_URL;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    /// Game world all prices are scoped to.
    pub world: String,
    /// Minimum spacing between outbound API calls.
    pub min_call_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// How long the item metadata feed is reused before refetching.
    pub metadata_ttl_secs: u64,
    /// Name of the env var holding an optional bearer token.
    pub api_token_env: Option<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            world: "Secura".to_string(),
            min_call_interval_ms: 1_000,
            request_timeout_secs: 30,
            metadata_ttl_secs: 6 * 3600,
            api_token_env: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValuationConfig {
    /// Per-item lookups allowed in flight at once (the client throttle
    /// still spaces the actual requests).
    pub max_in_flight: usize,
    /// Consult order-book depth; when false only top-of-book is used.
    pub use_depth: bool,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            use_depth: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The market API token, if the config names an env var and it is set.
    pub fn market_api_token(&self) -> Option<String> {
        self.market
            .api_token_env
            .as_deref()
            .and_then(|env| Self::resolve_env(env).ok())
    }
}
