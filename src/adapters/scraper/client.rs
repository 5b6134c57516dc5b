use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::adapters::scraper::rate_limiter::RateLimiter;
use crate::config::types::FetcherConfig;
use crate::error::{RateShopperError, Result};
use crate::ports::page_fetcher::PageFetcher;

/// Plain HTTP page fetcher for property pages that embed their room data.
///
/// Retries are not done here; the engine decides whether a failed
/// navigation is repeated.
pub struct HttpPageFetcher {
    http: Client,
    rate_limiter: RateLimiter,
    timeout_secs: u64,
}

impl HttpPageFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).map_err(|e| {
                RateShopperError::Configuration(format!(
                    "invalid accept_language '{}': {e}",
                    config.accept_language
                ))
            })?,
        );

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(config.rate_limit_per_second),
            timeout_secs: config.request_timeout_secs,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.rate_limiter.wait().await;

        debug!(url, "Fetching page");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e, self.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| classify_send_error(url, e, self.timeout_secs));
        }
        if status.as_u16() == 429 {
            warn!(url, "Rate limited by platform (429)");
            return Err(RateShopperError::FetchNavigation {
                url: url.to_string(),
                reason: "rate limited (429)".into(),
            });
        }
        Err(RateShopperError::FetchNavigation {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        })
    }
}

fn classify_send_error(url: &str, error: reqwest::Error, timeout_secs: u64) -> RateShopperError {
    if error.is_timeout() {
        RateShopperError::FetchTimeout {
            url: url.to_string(),
            timeout_secs,
        }
    } else if error.is_connect() || error.is_request() || error.is_body() {
        RateShopperError::FetchNavigation {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        RateShopperError::Http(error)
    }
}
