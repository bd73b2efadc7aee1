//! Configuration management
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults
//! 2. the JSON config file (`config/config.json` by default)
//! 3. a `.env` file in the working directory
//! 4. the process environment
//!
//! Credentials come from `TESTNET_API_KEY` and `TESTNET_SECRET_KEY`
//! (`TESTNET_API_SECRET` is accepted as an alias), or from the file's
//! `api_key` / `api_secret` fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::Credentials;

/// Default REST endpoint (Binance spot testnet)
pub const DEFAULT_BASE_URL: &str = "https://testnet.binance.vision";

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

pub const ENV_API_KEY: &str = "TESTNET_API_KEY";
pub const ENV_SECRET_KEY: &str = "TESTNET_SECRET_KEY";
pub const ENV_SECRET_KEY_ALIAS: &str = "TESTNET_API_SECRET";
pub const ENV_BASE_URL: &str = "TESTNET_BASE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub settings: Settings,
}

/// Client and order settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    /// HTTP timeout in seconds
    #[serde(rename = "timeout", deserialize_with = "number_or_string")]
    pub timeout_secs: u64,
    #[serde(deserialize_with = "number_or_string")]
    pub retry_attempts: u32,
    /// Pause between retries in milliseconds
    #[serde(rename = "retry_delay", deserialize_with = "number_or_string")]
    pub retry_delay_ms: u64,
    /// Minimum order notional in quote currency
    #[serde(deserialize_with = "number_or_string")]
    pub min_order_size: f64,
    pub default_market: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            min_order_size: 10.0,
            default_market: "BTCUSDT".to_string(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Accept `30` as well as `"30"`
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a number or numeric string, got {}",
                other
            )))
        }
    };
    text.trim().parse().map_err(serde::de::Error::custom)
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Load every layer: defaults, config file, `.env`, environment
    ///
    /// A missing config file is fine. A broken one is reported and skipped.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            match Self::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Error reading config file {}: {:#}", path.display(), e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());

        info!(
            "API key found: {}, API secret found: {}",
            if has_value(&config.api_key) { "yes" } else { "no" },
            if has_value(&config.api_secret) { "yes" } else { "no" },
        );
        if !config.is_valid() {
            warn!("API credentials not found in environment variables or config file");
        }

        config
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(secret) = non_empty(ENV_SECRET_KEY).or_else(|| non_empty(ENV_SECRET_KEY_ALIAS))
        {
            self.api_secret = Some(secret);
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            info!("Using base URL from environment: {}", url);
            self.settings.base_url = url;
        }
    }

    /// Both credentials present and non-empty
    pub fn is_valid(&self) -> bool {
        has_value(&self.api_key) && has_value(&self.api_secret)
    }

    /// Credentials for signed endpoints
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(Credentials::new(key.clone(), secret.clone()))
            }
            _ => anyhow::bail!(
                "API credentials missing: set {} and {} (environment or .env) or api_key/api_secret in the config file",
                ENV_API_KEY,
                ENV_SECRET_KEY
            ),
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}
