//! Bundle-size price resolution.
//!
//! When a minimum-length-of-stay restriction is in effect the platform shows
//! no price for shorter stays. For every uncovered check-in date the engine
//! probes stays of 1, 2, ... `max_bundle_size` nights, takes the first stay
//! that discloses an eligible rate, and spreads its total evenly over the
//! occupied nights. Those nights are then covered and never probed again as
//! check-ins within the same run.

pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::adapters::scraper::availability_parser::AvailabilityParser;
use crate::config::types::EngineConfig;
use crate::domain::bundle::ResolvedBundle;
use crate::domain::dates::CoveredDateSet;
use crate::domain::package::classify;
use crate::domain::rate::PageAvailability;
use crate::domain::run::{DateOutcome, RunRequest, RunSummary, RunTotals};
use crate::domain::trial::{TrialQuery, build_trial};
use crate::error::{RateShopperError, Result};
use crate::ports::cache::AvailabilityCache;
use crate::ports::page_fetcher::PageFetcher;
use crate::ports::progress::ProgressReporter;
use crate::ports::result_sink::ResultSink;
use retry::{RetryOutcome, RetryPolicy, with_retry};

/// Mutable state of one run. Only the engine touches it.
struct ExtractionRun<'a> {
    request: &'a RunRequest,
    total_dates: usize,
    covered: CoveredDateSet,
    totals: RunTotals,
    bundles_resolved: usize,
    unresolved_dates: Vec<NaiveDate>,
    cancelled: bool,
}

impl<'a> ExtractionRun<'a> {
    fn new(request: &'a RunRequest, total_dates: usize) -> Self {
        Self {
            request,
            total_dates,
            covered: CoveredDateSet::new(),
            totals: RunTotals::default(),
            bundles_resolved: 0,
            unresolved_dates: Vec::new(),
            cancelled: false,
        }
    }

    fn into_summary(self) -> RunSummary {
        RunSummary {
            property_url: self.request.property_url.clone(),
            date_range: self.request.date_range,
            total_dates: self.total_dates,
            dates_processed: self.totals.dates_processed,
            prices_extracted: self.totals.prices_extracted,
            errors_count: self.totals.errors_count,
            bundles_resolved: self.bundles_resolved,
            unresolved_dates: self.unresolved_dates,
            cancelled: self.cancelled,
        }
    }
}

pub struct BundleResolutionEngine {
    fetcher: Arc<dyn PageFetcher>,
    cache: Option<Arc<dyn AvailabilityCache>>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    default_currency: String,
    max_dates: usize,
}

impl BundleResolutionEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &EngineConfig) -> Self {
        Self {
            fetcher,
            cache: None,
            retry: RetryPolicy::from_config(config),
            fetch_timeout: config.fetch_timeout(),
            default_currency: config.default_currency.clone(),
            max_dates: config.max_dates_per_run,
        }
    }

    /// Reuse parsed trial results across runs.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn AvailabilityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Resolve nightly rates for every date in the request, sequentially.
    ///
    /// Only invalid input is an error. Failed trials, unresolved dates and
    /// sink failures are counted in the summary, and cancellation ends the
    /// run early with `cancelled = true`.
    pub async fn run(
        &self,
        request: &RunRequest,
        sink: &dyn ResultSink,
        progress: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        request.validate(self.max_dates)?;
        let dates = request.date_range.expand()?;
        let parser = AvailabilityParser::new(request.min_occupancy, self.default_currency.clone());
        let mut run = ExtractionRun::new(request, dates.len());

        info!(
            url = %request.property_url,
            range = %request.date_range,
            max_bundle_size = request.max_bundle_size,
            min_occupancy = request.min_occupancy,
            "Starting rate extraction"
        );

        for checkin in dates {
            if cancel.is_cancelled() {
                info!(%checkin, "Extraction cancelled");
                run.cancelled = true;
                break;
            }

            if run.covered.contains(checkin) {
                trace!(%checkin, "Already covered by an earlier bundle, skipping");
            } else {
                match self.resolve_date(checkin, &parser, &mut run, cancel).await {
                    DateOutcome::Resolved(bundle) => {
                        run.bundles_resolved += 1;
                        self.persist_bundle(&bundle, &mut run, sink).await;
                    }
                    DateOutcome::Unresolved { max_bundle_size } => {
                        warn!(%checkin, max_bundle_size, "No price found within max bundle size");
                        run.unresolved_dates.push(checkin);
                    }
                    DateOutcome::Cancelled => {
                        info!(%checkin, "Extraction cancelled during retries");
                        run.cancelled = true;
                        break;
                    }
                }
            }

            run.totals.dates_processed += 1;
            if let Some(reporter) = progress {
                reporter.update(
                    run.totals.dates_processed,
                    run.total_dates,
                    run.totals.prices_extracted,
                );
            }
        }

        if let Err(e) = sink.flush().await {
            error!(error = %e, "Failed to flush result sink");
            run.totals.errors_count += 1;
        }

        let summary = run.into_summary();
        info!(
            dates_processed = summary.dates_processed,
            prices_extracted = summary.prices_extracted,
            errors = summary.errors_count,
            cancelled = summary.cancelled,
            "Rate extraction finished"
        );
        Ok(summary)
    }

    /// Escalate the stay length for one check-in until a price is disclosed.
    async fn resolve_date(
        &self,
        checkin: NaiveDate,
        parser: &AvailabilityParser,
        run: &mut ExtractionRun<'_>,
        cancel: &CancellationToken,
    ) -> DateOutcome {
        let request = run.request;
        for nights in 1..=request.max_bundle_size {
            let trial = match build_trial(&request.property_url, checkin, nights) {
                Ok(trial) => trial,
                Err(e) => {
                    error!(%checkin, nights, error = %e, "Could not build trial URL");
                    run.totals.errors_count += 1;
                    return DateOutcome::Unresolved {
                        max_bundle_size: request.max_bundle_size,
                    };
                }
            };

            let outcome =
                with_retry(&self.retry, cancel, |attempt| self.attempt(&trial, parser, attempt))
                    .await;

            match outcome {
                RetryOutcome::Success {
                    value: availability,
                    attempts,
                } => {
                    if let Some(block) = availability.cheapest() {
                        let package = classify(checkin, nights);
                        let bundle = ResolvedBundle::from_block(checkin, nights, block, package);
                        info!(
                            %checkin,
                            nights,
                            attempts,
                            room = %bundle.room_name,
                            total_price = bundle.total_price,
                            per_night_price = bundle.per_night_price,
                            package = %package,
                            tier = %package.tier(),
                            "Resolved bundle"
                        );
                        return DateOutcome::Resolved(bundle);
                    }
                    debug!(
                        %checkin,
                        nights,
                        rooms_found = availability.rooms_found,
                        "No eligible rate for this stay length, escalating"
                    );
                }
                RetryOutcome::Failed {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        %checkin,
                        nights,
                        attempts,
                        error = %last_error,
                        "Trial failed, escalating"
                    );
                    run.totals.errors_count += 1;
                }
                RetryOutcome::Cancelled { .. } => return DateOutcome::Cancelled,
            }
        }

        DateOutcome::Unresolved {
            max_bundle_size: request.max_bundle_size,
        }
    }

    /// One fetch + parse under the per-navigation timeout.
    ///
    /// A cached result answers the trial without navigating. Fresh results
    /// are cached only once they parse, so a retry after a parse failure
    /// always reloads the page.
    async fn attempt(
        &self,
        trial: &TrialQuery,
        parser: &AvailabilityParser,
        attempt: u32,
    ) -> Result<PageAvailability> {
        let key = trial.key(parser.min_occupancy());
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(checkin = %trial.checkin, nights = trial.nights, "Trial served from cache");
            return Ok(cached);
        }

        trace!(url = %trial.url, nights = trial.nights, attempt, "Fetching trial");
        let page = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&trial.url))
            .await
            .map_err(|_| RateShopperError::FetchTimeout {
                url: trial.url.clone(),
                timeout_secs: self.fetch_timeout.as_secs(),
            })??;
        let availability = parser.parse(&page)?;
        if let Some(cache) = &self.cache {
            cache.put(key, &availability);
        }
        Ok(availability)
    }

    /// Write one row per occupied night inside the requested range and mark it covered.
    async fn persist_bundle(
        &self,
        bundle: &ResolvedBundle,
        run: &mut ExtractionRun<'_>,
        sink: &dyn ResultSink,
    ) {
        for rate in bundle.nightly_rates() {
            let night = rate.check_in_date;
            if !run.request.date_range.contains(night) {
                trace!(%night, checkin = %bundle.checkin, "Night outside requested range, skipped");
                continue;
            }
            if run.covered.contains(night) {
                trace!(%night, "Night already covered, not persisted again");
                continue;
            }
            match sink.write(&rate).await {
                Ok(()) => run.totals.prices_extracted += 1,
                Err(e) => {
                    error!(%night, error = %e, "Failed to persist nightly rate");
                    run.totals.errors_count += 1;
                }
            }
            run.covered.add(night);
        }
    }
}
