#![allow(clippy::cast_precision_loss)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::dates::add_days;
use crate::domain::package::PackageLabel;
use crate::domain::rate::RateBlock;

/// Cheapest rate disclosed for the shortest stay the platform would price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBundle {
    pub checkin: NaiveDate,
    pub nights: u32,
    pub total_price: f64,
    pub per_night_price: f64,
    pub room_name: String,
    pub currency: String,
    pub package: PackageLabel,
}

impl ResolvedBundle {
    pub fn from_block(
        checkin: NaiveDate,
        nights: u32,
        block: &RateBlock,
        package: PackageLabel,
    ) -> Self {
        Self {
            checkin,
            nights,
            total_price: block.total_price,
            per_night_price: per_night(block.total_price, nights),
            room_name: block.room_name.clone(),
            currency: block.currency.clone(),
            package,
        }
    }

    pub fn checkout(&self) -> NaiveDate {
        add_days(self.checkin, self.nights)
    }

    /// Occupied nights: `checkin .. checkin + nights`, checkout excluded.
    pub fn occupied_nights(&self) -> Vec<NaiveDate> {
        self.checkin.iter_days().take(self.nights as usize).collect()
    }

    pub fn is_bundle(&self) -> bool {
        self.nights > 1
    }

    /// One single-night row per occupied night.
    pub fn nightly_rates(&self) -> Vec<NightlyRate> {
        self.occupied_nights()
            .into_iter()
            .map(|night| NightlyRate {
                check_in_date: night,
                check_out_date: add_days(night, 1),
                price: self.per_night_price,
                room_type: self.room_name.clone(),
                currency: self.currency.clone(),
                is_bundle: self.is_bundle(),
                bundle_size: self.nights,
                package_type: self.package,
            })
            .collect()
    }
}

/// Even split of a bundle total across its nights, rounded to cents.
pub fn per_night(total_price: f64, nights: u32) -> f64 {
    if nights == 0 {
        return total_price;
    }
    (total_price / f64::from(nights) * 100.0).round() / 100.0
}

/// A persisted single-night row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightlyRate {
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub price: f64,
    pub room_type: String,
    pub currency: String,
    pub is_bundle: bool,
    pub bundle_size: u32,
    pub package_type: PackageLabel,
}

impl NightlyRate {
    pub fn bundle_info(&self) -> String {
        let mut info = if self.is_bundle {
            format!("{}-night bundle", self.bundle_size)
        } else {
            "single night".to_string()
        };
        if self.package_type != PackageLabel::Regular {
            info.push_str(&format!(" [{}]", self.package_type));
        }
        info
    }

    /// `check_in;check_out;price;bundle_info`
    pub fn to_csv_line(&self) -> String {
        format!(
            "{};{};{};{}",
            self.check_in_date.format("%Y-%m-%d"),
            self.check_out_date.format("%Y-%m-%d"),
            format_price_locale(self.price, &self.currency),
            self.bundle_info()
        )
    }
}

impl std::fmt::Display for NightlyRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<12} {:>14}  {:<28} {}",
            self.check_in_date.format("%Y-%m-%d"),
            format_price_locale(self.price, &self.currency),
            self.room_type,
            self.bundle_info()
        )
    }
}

pub fn currency_symbol(currency: &str) -> &str {
    match currency {
        "BRL" => "R$",
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        other => other,
    }
}

/// pt-BR style: `R$ 1.234,56`.
pub fn format_price_locale(price: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{} {sign}{grouped},{frac_part}", currency_symbol(currency))
}
