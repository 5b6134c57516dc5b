use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::bundle::NightlyRate;
use crate::error::{RateShopperError, Result};
use crate::ports::result_sink::ResultSink;

/// Keeps rows in memory, in write order.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<NightlyRate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<NightlyRate> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn write(&self, rate: &NightlyRate) -> Result<()> {
        self.rows
            .lock()
            .map_err(|_| RateShopperError::Persistence {
                reason: "memory sink lock poisoned".into(),
            })?
            .push(rate.clone());
        Ok(())
    }
}
