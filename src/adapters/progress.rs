use tracing::info;

use crate::ports::progress::ProgressReporter;

/// Logs run progress every `every` dates and on the last one.
pub struct TracingProgressReporter {
    every: usize,
}

impl TracingProgressReporter {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingProgressReporter {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn update(&self, processed: usize, total: usize, prices_extracted: usize) {
        if processed % self.every == 0 || processed == total {
            info!(processed, total, prices_extracted, "Extraction progress");
        }
    }
}
