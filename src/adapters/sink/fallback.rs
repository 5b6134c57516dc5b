use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::bundle::NightlyRate;
use crate::error::{RateShopperError, Result};
use crate::ports::result_sink::ResultSink;

/// Writes to the primary sink and, when that fails, to the fallback.
pub struct FallbackSink {
    primary: Arc<dyn ResultSink>,
    fallback: Arc<dyn ResultSink>,
}

impl FallbackSink {
    pub fn new(primary: Arc<dyn ResultSink>, fallback: Arc<dyn ResultSink>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ResultSink for FallbackSink {
    async fn write(&self, rate: &NightlyRate) -> Result<()> {
        match self.primary.write(rate).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                warn!(
                    error = %primary_err,
                    night = %rate.check_in_date,
                    "Primary sink failed, writing to fallback"
                );
                self.fallback.write(rate).await.map_err(|fallback_err| {
                    RateShopperError::Persistence {
                        reason: format!("primary: {primary_err}; fallback: {fallback_err}"),
                    }
                })
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        let primary = self.primary.flush().await;
        let fallback = self.fallback.flush().await;
        primary.and(fallback)
    }
}

/// Writes every row to each sink; reports the first failure after trying all.
pub struct TeeSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn ResultSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ResultSink for TeeSink {
    async fn write(&self, rate: &NightlyRate) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.write(rate).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn flush(&self) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush().await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
