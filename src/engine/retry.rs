use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::types::EngineConfig;
use crate::error::{RateShopperError, Result};

/// Bounded attempts with doubling backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the 1-based `attempt`: none before the first, then
    /// `initial`, `2 * initial`, `4 * initial`, ... capped at `max_backoff`.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed, or a non-transient error stopped the loop early.
    Failed {
        attempts: u32,
        last_error: RateShopperError,
    },
    /// Cancellation observed at an attempt boundary.
    Cancelled { attempts: u32 },
}

/// Run `attempt_fn` until it succeeds, a non-transient error occurs, or the
/// policy's attempts are used up.
///
/// Cancellation is checked before each attempt and while backing off; an
/// attempt already in flight is never interrupted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        let delay = policy.backoff_before(attempt);
        if !delay.is_zero() {
            debug!(attempt, delay_ms = delay.as_millis(), "Backing off before retry");
            tokio::select! {
                () = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt - 1 },
                () = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled {
                attempts: attempt - 1,
            };
        }

        match attempt_fn(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) if !e.is_transient() => {
                return RetryOutcome::Failed {
                    attempts: attempt,
                    last_error: e,
                };
            }
            Err(e) => {
                warn!(error = %e, attempt, max_attempts = policy.max_attempts, "Attempt failed");
                last_error = Some(e);
            }
        }
    }

    RetryOutcome::Failed {
        attempts: policy.max_attempts,
        last_error: last_error.unwrap_or_else(|| RateShopperError::Parse {
            reason: "no attempt was made".into(),
        }),
    }
}
