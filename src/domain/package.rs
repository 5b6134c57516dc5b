use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Reporting priority of a package. Has no effect on pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageTier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for PackageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Special-rate package a resolved bundle is believed to belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageLabel {
    Regular,
    NewYear,
    Carnival,
    WeekendPackage,
}

impl PackageLabel {
    pub fn tier(self) -> PackageTier {
        match self {
            Self::Regular => PackageTier::Low,
            Self::WeekendPackage => PackageTier::Medium,
            Self::NewYear | Self::Carnival => PackageTier::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::NewYear => "NEW_YEAR",
            Self::Carnival => "CARNIVAL",
            Self::WeekendPackage => "WEEKEND_PACKAGE",
        }
    }
}

impl std::fmt::Display for PackageLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label a bundle by its check-in date and length. Rules are checked in order:
/// New Year window, Carnival window, Friday three-night weekend, otherwise regular.
pub fn classify(checkin: NaiveDate, nights: u32) -> PackageLabel {
    let (month, day) = (checkin.month(), checkin.day());
    if (month == 12 && day >= 28) || (month == 1 && day <= 5) {
        return PackageLabel::NewYear;
    }
    if (month == 2 && day >= 20) || (month == 3 && day <= 10) {
        return PackageLabel::Carnival;
    }
    if nights == 3 && checkin.weekday() == Weekday::Fri {
        return PackageLabel::WeekendPackage;
    }
    PackageLabel::Regular
}
