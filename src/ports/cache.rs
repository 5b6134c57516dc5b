use crate::domain::rate::PageAvailability;
use crate::domain::trial::TrialKey;

/// Parsed trial results kept across runs.
///
/// Only pages that parsed cleanly are stored, so a retry after a parse
/// failure always goes back to the platform.
pub trait AvailabilityCache: Send + Sync {
    fn get(&self, key: &TrialKey) -> Option<PageAvailability>;
    fn put(&self, key: TrialKey, availability: &PageAvailability);
}
