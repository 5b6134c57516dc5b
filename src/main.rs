use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rate_shopper::adapters::cache::memory_cache::MemoryAvailabilityCache;
use rate_shopper::adapters::scraper::client::HttpPageFetcher;
use rate_shopper::adapters::sink::csv_sink::CsvFileSink;
use rate_shopper::adapters::sink::fallback::FallbackSink;
use rate_shopper::config::load_config;
use rate_shopper::config::types::OutputConfig;
use rate_shopper::mcp::server::RateShopperMcpServer;
use rate_shopper::ports::page_fetcher::PageFetcher;
use rate_shopper::ports::result_sink::ResultSink;

fn find_config_path() -> PathBuf {
    let candidates = [
        PathBuf::from("config.yaml"),
        binary_dir().join("config.yaml"),
    ];

    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    candidates[0].clone()
}

fn binary_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn open_csv(path: &str) -> Option<Arc<dyn ResultSink>> {
    match CsvFileSink::open(path) {
        Ok(sink) => {
            tracing::info!(path, "Writing nightly rates to CSV");
            Some(Arc::new(sink))
        }
        Err(e) => {
            tracing::error!(path, error = %e, "Could not open CSV output");
            None
        }
    }
}

/// Persistent sink from the output section: primary CSV, falling back to a second file.
fn build_sink(output: &OutputConfig) -> Option<Arc<dyn ResultSink>> {
    let primary = output.csv_path.as_deref().and_then(open_csv);
    let fallback = output.fallback_csv_path.as_deref().and_then(open_csv);
    match (primary, fallback) {
        (Some(primary), Some(fallback)) => Some(Arc::new(FallbackSink::new(primary, fallback))),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting rate-shopper server");

    let config_path = find_config_path();
    let config = load_config(&config_path)?;

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(&config.fetcher)?);
    let cache = Arc::new(MemoryAvailabilityCache::new(
        config.cache.max_entries,
        Duration::from_secs(config.cache.page_ttl_secs),
    ));

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling in-flight runs");
            ctrl_c_token.cancel();
        }
    });

    let mut server = RateShopperMcpServer::new(fetcher, config.engine)
        .with_cache(cache)
        .with_shutdown(shutdown);
    if let Some(sink) = build_sink(&config.output) {
        server = server.with_sink(sink);
    }

    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
