use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::bundle::NightlyRate;
use crate::domain::package::PackageLabel;
use crate::error::{RateShopperError, Result};
use crate::ports::page_fetcher::PageFetcher;
use crate::ports::progress::ProgressReporter;
use crate::ports::result_sink::ResultSink;

type FetchFn = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Page fetcher driven by a closure. Records every requested URL.
pub struct MockPageFetcher {
    fetch_fn: FetchFn,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            fetch_fn: Box::new(f),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.fetch_fn)(url)
    }
}

/// Sink that rejects every write.
pub struct FailingSink;

#[async_trait]
impl ResultSink for FailingSink {
    async fn write(&self, _rate: &NightlyRate) -> Result<()> {
        Err(RateShopperError::Persistence {
            reason: "disk full".into(),
        })
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(usize, usize, usize)>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<(usize, usize, usize)> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn update(&self, processed: usize, total: usize, prices_extracted: usize) {
        self.updates
            .lock()
            .unwrap()
            .push((processed, total, prices_extracted));
    }
}

// --- Factory functions ---

pub fn make_nightly_rate(date: &str, price: f64, bundle_size: u32) -> NightlyRate {
    let check_in_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    NightlyRate {
        check_in_date,
        check_out_date: check_in_date.succ_opt().unwrap(),
        price,
        room_type: "Quarto Duplo".to_string(),
        currency: "BRL".to_string(),
        is_bundle: bundle_size > 1,
        bundle_size,
        package_type: PackageLabel::Regular,
    }
}

/// Property page with the embedded rooms global. Each room is `(name, max persons, total)`.
pub fn rooms_page(rooms: &[(&str, u32, f64)]) -> String {
    let mut json = String::from("[");
    for (i, (name, persons, price)) in rooms.iter().enumerate() {
        if i > 0 {
            json.push(',');
        }
        write!(
            json,
            r#"{{"b_name":"{name}","b_blocks":[{{"b_max_persons":{persons},"b_raw_price":"{price:.2}"}}]}}"#
        )
        .unwrap();
    }
    json.push(']');
    format!(
        "<html><head><script>var booking = {{ b_selected_currency: 'BRL', \
         b_rooms_available_and_soldout: {json}, }};</script></head><body></body></html>"
    )
}

pub fn no_rooms_page() -> String {
    r#"<html><body><div id="no_availability_msg">No rooms available for your dates</div></body></html>"#
        .to_string()
}

fn query_param(url: &str, key: &str) -> NaiveDate {
    let parsed = url::Url::parse(url).unwrap();
    let value = parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .unwrap();
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").unwrap()
}

/// Check-in date of a trial URL.
pub fn query_date(url: &str) -> NaiveDate {
    query_param(url, "checkin")
}

/// Stay length of a trial URL.
pub fn query_nights(url: &str) -> i64 {
    (query_param(url, "checkout") - query_param(url, "checkin")).num_days()
}
