use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateShopperError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Navigation to {url} timed out after {timeout_secs}s")]
    FetchTimeout { url: String, timeout_secs: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    FetchNavigation { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse availability page: {reason}")]
    Parse { reason: String },

    #[error("Failed to persist nightly rate: {reason}")]
    Persistence { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl RateShopperError {
    /// Whether a failed attempt may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FetchTimeout { .. }
                | Self::FetchNavigation { .. }
                | Self::Http(_)
                | Self::Parse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RateShopperError>;
