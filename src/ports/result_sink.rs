use async_trait::async_trait;

use crate::domain::bundle::NightlyRate;
use crate::error::Result;

/// Persistence target for resolved single-night rows.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&self, rate: &NightlyRate) -> Result<()>;

    /// Make buffered rows durable. Called once at the end of a run.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
