use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::domain::rate::PageAvailability;
use crate::domain::trial::TrialKey;
use crate::ports::cache::AvailabilityCache;

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

struct Stored {
    availability: PageAvailability,
    stored_at: Instant,
}

/// LRU of parsed trial results. Every entry lives for the same `ttl`.
pub struct MemoryAvailabilityCache {
    entries: Mutex<LruCache<TrialKey, Stored>>,
    ttl: Duration,
}

impl MemoryAvailabilityCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or_else(|| {
            tracing::warn!("Cache max_entries was 0, using {FALLBACK_CAPACITY}");
            FALLBACK_CAPACITY
        });
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AvailabilityCache for MemoryAvailabilityCache {
    fn get(&self, key: &TrialKey) -> Option<PageAvailability> {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::error!(checkin = %key.checkin, "Availability cache lock poisoned, miss");
            return None;
        };
        let fresh = entries.get(key)?.stored_at.elapsed() < self.ttl;
        if !fresh {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|s| s.availability.clone())
    }

    fn put(&self, key: TrialKey, availability: &PageAvailability) {
        if self.ttl.is_zero() {
            return;
        }
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.put(
                    key,
                    Stored {
                        availability: availability.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
            Err(_) => {
                tracing::error!(checkin = %key.checkin, "Availability cache lock poisoned");
            }
        }
    }
}
