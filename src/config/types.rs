use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::run::MAX_BUNDLE_SIZE;
use crate::error::{RateShopperError, Result};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Bundle escalation and retry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_bundle_size")]
    pub max_bundle_size: u32,
    #[serde(default = "default_min_occupancy")]
    pub min_occupancy: u32,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Upper bound on check-in dates accepted by one run.
    #[serde(default = "default_max_dates_per_run")]
    pub max_dates_per_run: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BUNDLE_SIZE).contains(&self.max_bundle_size) {
            return Err(RateShopperError::Configuration(format!(
                "max_bundle_size must be between 1 and {MAX_BUNDLE_SIZE}"
            )));
        }
        if self.max_dates_per_run == 0 {
            return Err(RateShopperError::Configuration(
                "max_dates_per_run must be at least 1".into(),
            ));
        }
        if self.min_occupancy == 0 {
            return Err(RateShopperError::Configuration(
                "min_occupancy must be at least 1".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(RateShopperError::Configuration(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(RateShopperError::Configuration(
                "fetch_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bundle_size: default_max_bundle_size(),
            min_occupancy: default_min_occupancy(),
            max_retries: default_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            fetch_timeout_secs: default_fetch_timeout(),
            default_currency: default_currency(),
            max_dates_per_run: default_max_dates_per_run(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: f64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            rate_limit_per_second: default_rate_limit(),
            request_timeout_secs: default_timeout(),
            accept_language: default_accept_language(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_page_ttl")]
    pub page_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            page_ttl_secs: default_page_ttl(),
        }
    }
}

/// Where resolved nightly rates are persisted. Both paths are optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub csv_path: Option<String>,
    #[serde(default)]
    pub fallback_csv_path: Option<String>,
}

fn default_max_bundle_size() -> u32 {
    7
}

fn default_min_occupancy() -> u32 {
    2
}

fn default_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_fetch_timeout() -> u64 {
    45
}

fn default_currency() -> String {
    "BRL".into()
}

fn default_max_dates_per_run() -> usize {
    366
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
}

fn default_rate_limit() -> f64 {
    0.5
}

fn default_timeout() -> u64 {
    30
}

fn default_accept_language() -> String {
    "pt-BR,pt;q=0.9".into()
}

fn default_max_entries() -> usize {
    500
}

fn default_page_ttl() -> u64 {
    900
}
