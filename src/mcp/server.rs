use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::adapters::progress::TracingProgressReporter;
use crate::adapters::sink::fallback::TeeSink;
use crate::adapters::sink::memory_sink::MemorySink;
use crate::config::types::EngineConfig;
use crate::domain::dates::DateRange;
use crate::domain::package::classify;
use crate::domain::run::{RunRequest, RunSummary};
use crate::domain::trial::build_trial;
use crate::engine::BundleResolutionEngine;
use crate::ports::cache::AvailabilityCache;
use crate::ports::page_fetcher::PageFetcher;
use crate::ports::result_sink::ResultSink;

// ---------- Resource Store ----------

/// Reports of completed runs, exposed as MCP resources under `rate-shopper://run/{n}`.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, ResourceEntry>>>,
}

#[derive(Clone)]
struct ResourceEntry {
    name: String,
    text: String,
}

impl ResourceStore {
    async fn insert(&self, uri: impl Into<String>, name: impl Into<String>, text: String) {
        self.entries.write().await.insert(
            uri.into(),
            ResourceEntry {
                name: name.into(),
                text,
            },
        );
    }

    async fn get(&self, uri: &str) -> Option<ResourceEntry> {
        self.entries.read().await.get(uri).cloned()
    }

    async fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.name.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ExtractToolParams {
    /// Property page URL (http/https). Existing query parameters such as
    /// `group_adults` are kept; date parameters are replaced per trial.
    pub property_url: String,
    /// First candidate check-in date (YYYY-MM-DD)
    pub start_date: String,
    /// Last candidate check-in date, inclusive (YYYY-MM-DD)
    pub end_date: String,
    /// Longest stay length to probe per date (default from config, usually 7)
    pub max_bundle_size: Option<u32>,
    /// Minimum room occupancy for a rate to count (default from config, usually 2)
    pub min_occupancy: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct TrialUrlToolParams {
    /// Property page URL (http/https)
    pub property_url: String,
    /// Check-in date (YYYY-MM-DD)
    pub checkin: String,
    /// Stay length in nights (>= 1)
    pub nights: u32,
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid {field} '{value}': {e}. Use YYYY-MM-DD."))
}

#[derive(Clone)]
pub struct RateShopperMcpServer {
    fetcher: Arc<dyn PageFetcher>,
    engine_config: EngineConfig,
    cache: Option<Arc<dyn AvailabilityCache>>,
    sink: Option<Arc<dyn ResultSink>>,
    // One fetcher session serves one run at a time
    run_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
    run_counter: Arc<AtomicUsize>,
    tool_router: ToolRouter<Self>,
    resources: ResourceStore,
}

#[tool_router]
impl RateShopperMcpServer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, engine_config: EngineConfig) -> Self {
        Self {
            fetcher,
            engine_config,
            cache: None,
            sink: None,
            run_lock: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
            run_counter: Arc::new(AtomicUsize::new(0)),
            tool_router: Self::tool_router(),
            resources: ResourceStore::default(),
        }
    }

    /// Persistent sink that receives every extracted row in addition to the tool response.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Parsed trial cache shared by every run this server starts.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn AvailabilityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Token whose cancellation stops in-flight runs at the next date or retry boundary.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn build_request(&self, params: ExtractToolParams) -> Result<RunRequest, String> {
        let start = parse_date("start_date", &params.start_date)?;
        let end = parse_date("end_date", &params.end_date)?;
        let date_range = DateRange::new(start, end).map_err(|e| e.to_string())?;
        let request = RunRequest {
            property_url: params.property_url.trim().to_string(),
            date_range,
            max_bundle_size: params
                .max_bundle_size
                .unwrap_or(self.engine_config.max_bundle_size),
            min_occupancy: params
                .min_occupancy
                .unwrap_or(self.engine_config.min_occupancy),
        };
        request
            .validate(self.engine_config.max_dates_per_run)
            .map_err(|e| e.to_string())?;
        Ok(request)
    }

    /// Resolve nightly rates for a property over a date range.
    #[tool(
        name = "rate_shopper_extract",
        description = "Extract nightly rates for a property over a date range. For each check-in date the stay length is escalated from 1 night up to max_bundle_size until a price is shown (minimum-stay restrictions hide shorter stays); a multi-night price is split evenly across its nights and those nights are not probed again. Returns a run summary and one row per resolved night.",
        annotations(open_world_hint = true)
    )]
    async fn rate_shopper_extract(
        &self,
        Parameters(params): Parameters<ExtractToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = match self.build_request(params) {
            Ok(request) => request,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };

        let _guard = self.run_lock.lock().await;
        let mut engine =
            BundleResolutionEngine::new(Arc::clone(&self.fetcher), &self.engine_config);
        if let Some(cache) = &self.cache {
            engine = engine.with_cache(Arc::clone(cache));
        }
        let rows = Arc::new(MemorySink::new());
        let sink: Arc<dyn ResultSink> = match &self.sink {
            Some(persistent) => Arc::new(TeeSink::new(vec![
                Arc::clone(persistent),
                Arc::clone(&rows) as Arc<dyn ResultSink>,
            ])),
            None => Arc::clone(&rows) as Arc<dyn ResultSink>,
        };
        let progress = TracingProgressReporter::default();
        let cancel = self.shutdown.child_token();

        match engine
            .run(&request, sink.as_ref(), Some(&progress), &cancel)
            .await
        {
            Ok(summary) => {
                let text = format_run_report(&summary, &rows);
                let n = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
                let uri = format!("rate-shopper://run/{n}");
                let name = format!("Run {n}: {} ({})", summary.date_range, summary.property_url);
                self.resources.insert(uri, name, text.clone()).await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Extraction failed: {e}"
            ))])),
        }
    }

    /// Preview the URL and package label for one trial stay.
    #[tool(
        name = "rate_shopper_trial_url",
        description = "Preview the trial URL that would be fetched for a check-in date and stay length, along with the seasonal package label (REGULAR, NEW_YEAR, CARNIVAL, WEEKEND_PACKAGE) of that stay. Does not fetch anything.",
        annotations(read_only_hint = true)
    )]
    async fn rate_shopper_trial_url(
        &self,
        Parameters(params): Parameters<TrialUrlToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let checkin = match parse_date("checkin", &params.checkin) {
            Ok(d) => d,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        match build_trial(params.property_url.trim(), checkin, params.nights) {
            Ok(trial) => {
                let package = classify(checkin, trial.nights);
                let mut text = String::new();
                let _ = writeln!(text, "URL: {}", trial.url);
                let _ = writeln!(text, "Check-in: {}", trial.checkin);
                let _ = writeln!(text, "Check-out: {}", trial.checkout);
                let _ = writeln!(text, "Nights: {}", trial.nights);
                let _ = writeln!(text, "Package: {package} (tier {})", package.tier());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Could not build trial URL: {e}"
            ))])),
        }
    }
}

fn format_run_report(summary: &RunSummary, rows: &MemorySink) -> String {
    let mut text = summary.to_string();
    let rows = rows.rows();
    if rows.is_empty() {
        text.push_str("\n\nNo nightly rates extracted.\n");
    } else {
        let _ = writeln!(text, "\n\nNightly rates ({}):", rows.len());
        for rate in &rows {
            let _ = writeln!(text, "{rate}");
        }
    }
    text
}

#[tool_handler]
impl ServerHandler for RateShopperMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Rate shopper for hotel property pages.\n\
                 \n\
                 ## Tools\n\
                 - rate_shopper_extract: resolve a price for every night in a date range. Stays are \
                 escalated from 1 night up to max_bundle_size until the page discloses a rate, so \
                 minimum-stay restrictions still yield per-night prices.\n\
                 - rate_shopper_trial_url: preview the URL and package label of one trial stay without fetching.\n\
                 \n\
                 ## Resources\n\
                 Each completed extraction is kept as a rate-shopper://run/{n} resource.\n\
                 \n\
                 ## Tips\n\
                 - Extractions run one at a time; a second call waits for the first to finish.\n\
                 - Keep guest parameters (group_adults, no_rooms) in the property URL; date parameters are replaced."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let entries = self.resources.list().await;
        let resources: Vec<Resource> = entries
            .into_iter()
            .map(|(uri, name)| Resource {
                annotations: None,
                raw: RawResource {
                    uri,
                    name,
                    title: None,
                    description: None,
                    mime_type: Some("text/plain".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let templates = vec![ResourceTemplate {
            annotations: None,
            raw: RawResourceTemplate {
                uri_template: "rate-shopper://run/{n}".into(),
                name: "Extraction Run".into(),
                title: Some("Extraction run report".into()),
                description: Some(
                    "Summary and nightly rates of a completed run (from rate_shopper_extract)"
                        .into(),
                ),
                mime_type: Some("text/plain".into()),
                icons: None,
            },
        }];
        Ok(ListResourceTemplatesResult {
            resource_templates: templates,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.resources.get(&request.uri).await {
            Some(entry) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(entry.text, request.uri)],
            }),
            None => Err(McpError::resource_not_found(
                format!("resource not found: {}", request.uri),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn extract_text(result: &CallToolResult) -> &str {
        result.content[0]
            .raw
            .as_text()
            .expect("expected text content")
            .text
            .as_str()
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            ..EngineConfig::default()
        }
    }

    fn make_server(mock: MockPageFetcher) -> RateShopperMcpServer {
        RateShopperMcpServer::new(Arc::new(mock), fast_config())
    }

    fn extract_params(start: &str, end: &str) -> ExtractToolParams {
        ExtractToolParams {
            property_url: "https://www.booking.com/hotel/br/pousada.html?group_adults=2".into(),
            start_date: start.into(),
            end_date: end.into(),
            max_bundle_size: Some(3),
            min_occupancy: None,
        }
    }

    #[tokio::test]
    async fn extract_returns_summary_and_rows() {
        let server = make_server(MockPageFetcher::new(|url| {
            if query_nights(url) == 2 {
                Ok(rooms_page(&[("Quarto Duplo", 2, 500.0)]))
            } else {
                Ok(no_rooms_page())
            }
        }));
        let result = server
            .rate_shopper_extract(Parameters(extract_params("2025-09-15", "2025-09-16")))
            .await
            .unwrap();
        let text = extract_text(&result);
        assert!(text.contains("Processed: 2/2"), "{text}");
        assert!(text.contains("Nightly rates (2)"));
        assert!(text.contains("R$ 250,00"));
        assert!(text.contains("2-night bundle"));
    }

    #[tokio::test]
    async fn extract_rejects_bad_date() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let result = server
            .rate_shopper_extract(Parameters(extract_params("15/09/2025", "2025-09-16")))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(extract_text(&result).contains("start_date"));
    }

    #[tokio::test]
    async fn extract_rejects_inverted_range() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let result = server
            .rate_shopper_extract(Parameters(extract_params("2025-09-20", "2025-09-16")))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn extract_rejects_unbounded_bundle_size() {
        let mock = Arc::new(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let server = RateShopperMcpServer::new(mock.clone(), fast_config());
        let mut params = extract_params("2025-09-15", "2025-09-16");
        params.max_bundle_size = Some(u32::MAX);
        let result = server.rate_shopper_extract(Parameters(params)).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(extract_text(&result).contains("max_bundle_size"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn extract_writes_to_persistent_sink() {
        let persistent = Arc::new(MemorySink::new());
        let server = make_server(MockPageFetcher::new(|_| {
            Ok(rooms_page(&[("Quarto Duplo", 2, 180.0)]))
        }))
        .with_sink(persistent.clone());
        server
            .rate_shopper_extract(Parameters(extract_params("2025-09-15", "2025-09-17")))
            .await
            .unwrap();
        assert_eq!(persistent.rows().len(), 3);
    }

    #[tokio::test]
    async fn extract_stores_run_resource() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        server
            .rate_shopper_extract(Parameters(extract_params("2025-09-15", "2025-09-15")))
            .await
            .unwrap();
        let entries = server.resources.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "rate-shopper://run/1");
        let entry = server.resources.get("rate-shopper://run/1").await.unwrap();
        assert!(entry.text.contains("No price within max bundle size"));
    }

    #[tokio::test]
    async fn shutdown_cancels_extraction() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())))
            .with_shutdown(shutdown);
        let result = server
            .rate_shopper_extract(Parameters(extract_params("2025-09-15", "2025-09-20")))
            .await
            .unwrap();
        assert!(extract_text(&result).contains("cancelled"));
    }

    #[tokio::test]
    async fn trial_url_preview() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let result = server
            .rate_shopper_trial_url(Parameters(TrialUrlToolParams {
                property_url: "https://www.booking.com/hotel/br/x.html?group_adults=2&checkin=2020-01-01"
                    .into(),
                checkin: "2025-12-30".into(),
                nights: 3,
            }))
            .await
            .unwrap();
        let text = extract_text(&result);
        assert!(text.contains("group_adults=2&checkin=2025-12-30&checkout=2026-01-02"));
        assert!(text.contains("Package: NEW_YEAR (tier HIGH)"));
    }

    #[tokio::test]
    async fn trial_url_rejects_zero_nights() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let result = server
            .rate_shopper_trial_url(Parameters(TrialUrlToolParams {
                property_url: "https://www.booking.com/hotel/br/x.html".into(),
                checkin: "2025-09-15".into(),
                nights: 0,
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn server_info_lists_tools() {
        let server = make_server(MockPageFetcher::new(|_| Ok(no_rooms_page())));
        let info = server.get_info();
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("rate_shopper_extract"));
        assert!(instructions.contains("rate_shopper_trial_url"));
    }
}
