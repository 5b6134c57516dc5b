use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::bundle::ResolvedBundle;
use crate::domain::dates::DateRange;
use crate::domain::trial::validate_property_url;
use crate::error::{RateShopperError, Result};

/// Longest stay ever probed for a single check-in.
pub const MAX_BUNDLE_SIZE: u32 = 30;

/// Inputs for one extraction run against one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub property_url: String,
    pub date_range: DateRange,
    pub max_bundle_size: u32,
    pub min_occupancy: u32,
}

impl RunRequest {
    /// Reject malformed input and runs longer than `max_dates` check-ins.
    pub fn validate(&self, max_dates: usize) -> Result<()> {
        validate_property_url(&self.property_url)?;
        if self.date_range.start > self.date_range.end {
            return Err(RateShopperError::Configuration(format!(
                "date range {} is inverted",
                self.date_range
            )));
        }
        if self.date_range.len_days() > max_dates {
            return Err(RateShopperError::Configuration(format!(
                "date range {} spans {} dates, limit is {max_dates}",
                self.date_range,
                self.date_range.len_days()
            )));
        }
        if !(1..=MAX_BUNDLE_SIZE).contains(&self.max_bundle_size) {
            return Err(RateShopperError::Configuration(format!(
                "max_bundle_size must be between 1 and {MAX_BUNDLE_SIZE}, got {}",
                self.max_bundle_size
            )));
        }
        if self.min_occupancy == 0 {
            return Err(RateShopperError::Configuration(
                "min_occupancy must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// What happened to one candidate check-in date.
#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    Resolved(ResolvedBundle),
    /// No stay up to `max_bundle_size` nights disclosed a price.
    Unresolved { max_bundle_size: u32 },
    Cancelled,
}

/// Running counters for an extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub dates_processed: usize,
    pub prices_extracted: usize,
    pub errors_count: usize,
}

/// Final report of a run. A run always ends with a summary, even when cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub property_url: String,
    pub date_range: DateRange,
    pub total_dates: usize,
    pub dates_processed: usize,
    pub prices_extracted: usize,
    pub errors_count: usize,
    pub bundles_resolved: usize,
    pub unresolved_dates: Vec<NaiveDate>,
    pub cancelled: bool,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rate extraction for {}", self.property_url)?;
        writeln!(f, "Range: {} ({} dates)", self.date_range, self.total_dates)?;
        writeln!(
            f,
            "Processed: {}/{}  Prices extracted: {}  Bundles: {}  Errors: {}",
            self.dates_processed,
            self.total_dates,
            self.prices_extracted,
            self.bundles_resolved,
            self.errors_count
        )?;
        if !self.unresolved_dates.is_empty() {
            let dates: Vec<String> = self
                .unresolved_dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            writeln!(f, "No price within max bundle size: {}", dates.join(", "))?;
        }
        if self.cancelled {
            writeln!(f, "Run was cancelled before completion")?;
        }
        Ok(())
    }
}
