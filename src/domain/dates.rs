use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{RateShopperError, Result};

/// Inclusive range of calendar dates to scan as candidate check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(RateShopperError::Configuration(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |label: &str, value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                RateShopperError::Configuration(format!(
                    "invalid {label} date '{value}', expected YYYY-MM-DD"
                ))
            })
        };
        Self::new(parse("start", start)?, parse("end", end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days()).map_or(0, |n| n + 1)
    }

    /// Expand into one candidate check-in per calendar day, ascending.
    pub fn expand(&self) -> Result<Vec<NaiveDate>> {
        if self.start > self.end {
            return Err(RateShopperError::Configuration(format!(
                "date range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(self.start.iter_days().take(self.len_days()).collect())
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// `date + days`, saturating at the calendar maximum.
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Nights already resolved by an earlier bundle in the current run.
#[derive(Debug, Clone, Default)]
pub struct CoveredDateSet {
    nights: BTreeSet<NaiveDate>,
}

impl CoveredDateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, night: NaiveDate) -> bool {
        self.nights.contains(&night)
    }

    /// Returns `false` when the night was already covered.
    pub fn add(&mut self, night: NaiveDate) -> bool {
        self.nights.insert(night)
    }

    pub fn len(&self) -> usize {
        self.nights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nights.is_empty()
    }
}
