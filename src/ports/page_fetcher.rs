use async_trait::async_trait;

use crate::error::Result;

/// Navigates to a URL and returns the raw page the platform served.
///
/// Implementations own one browsing session and are used by one run at a time.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
