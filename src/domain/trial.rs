use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::dates::add_days;
use crate::error::{RateShopperError, Result};

/// Query keys the builder owns; any existing values in the base URL are replaced.
const DATE_KEYS: &[&str] = &[
    "checkin",
    "checkout",
    "checkin_year",
    "checkin_month",
    "checkin_monthday",
    "checkout_year",
    "checkout_month",
    "checkout_monthday",
];

/// One probe of the platform: check in on `checkin`, stay `nights` nights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialQuery {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub nights: u32,
    /// Property URL with every stay-date parameter removed.
    pub property: String,
    pub url: String,
}

impl TrialQuery {
    /// Cache identity of this trial when parsed for guests of `min_occupancy`.
    pub fn key(&self, min_occupancy: u32) -> TrialKey {
        TrialKey {
            property: self.property.clone(),
            checkin: self.checkin,
            nights: self.nights,
            min_occupancy,
        }
    }
}

/// Identifies a parsed trial result independently of how its URL was spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrialKey {
    pub property: String,
    pub checkin: NaiveDate,
    pub nights: u32,
    pub min_occupancy: u32,
}

/// Validate that `base_url` is an absolute http(s) URL usable as a template.
pub fn validate_property_url(base_url: &str) -> Result<Url> {
    let parsed = Url::parse(base_url).map_err(|e| {
        RateShopperError::Configuration(format!("invalid property URL '{base_url}': {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RateShopperError::Configuration(format!(
            "property URL must be http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// Build the trial query and its URL.
///
/// Existing query pairs keep their order; date pairs are dropped and
/// `checkin`/`checkout` are appended, so identical inputs give identical URLs.
pub fn build_trial(base_url: &str, checkin: NaiveDate, nights: u32) -> Result<TrialQuery> {
    if nights == 0 {
        return Err(RateShopperError::Configuration(
            "trial stay must be at least one night".into(),
        ));
    }
    let mut parsed = validate_property_url(base_url)?;
    let checkout = add_days(checkin, nights);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !DATE_KEYS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed.set_query(None);
    if !kept.is_empty() {
        parsed.query_pairs_mut().extend_pairs(&kept);
    }
    let property = parsed.to_string();

    parsed
        .query_pairs_mut()
        .append_pair("checkin", &checkin.format("%Y-%m-%d").to_string())
        .append_pair("checkout", &checkout.format("%Y-%m-%d").to_string());

    Ok(TrialQuery {
        checkin,
        checkout,
        nights,
        property,
        url: parsed.to_string(),
    })
}
