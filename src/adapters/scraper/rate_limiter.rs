use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces navigations at least `1 / requests_per_second` apart.
///
/// Each caller reserves the next free slot under the lock and sleeps outside
/// it, so concurrent callers queue instead of firing together.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 && requests_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            tracing::warn!(
                "Rate limiter initialized with non-positive rate ({requests_per_second} req/s), no pacing applied"
            );
            Duration::ZERO
        };
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
