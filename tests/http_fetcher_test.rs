use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rate_shopper::adapters::cache::memory_cache::MemoryAvailabilityCache;
use rate_shopper::adapters::scraper::client::HttpPageFetcher;
use rate_shopper::adapters::sink::csv_sink::CsvFileSink;
use rate_shopper::adapters::sink::memory_sink::MemorySink;
use rate_shopper::config::types::{EngineConfig, FetcherConfig};
use rate_shopper::domain::dates::DateRange;
use rate_shopper::domain::run::RunRequest;
use rate_shopper::engine::BundleResolutionEngine;
use rate_shopper::engine::retry::RetryPolicy;
use rate_shopper::error::RateShopperError;
use rate_shopper::ports::page_fetcher::PageFetcher;

const HOTEL_PATH: &str = "/hotel/br/pousada-do-sol.pt-br.html";

fn fast_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        rate_limit_per_second: 0.0,
        request_timeout_secs: 1,
        ..Default::default()
    }
}

fn table_page(price: &str) -> String {
    format!(
        r#"<html><body>
        <table id="hprt-table" data-currency="BRL">
          <tr data-block-id="1_1">
            <td><a class="hprt-roomtype-link">Quarto Duplo Superior</a></td>
            <td class="hprt-occupancy-occupancy-info" data-occupancy="2"></td>
            <td><span class="prco-valign-middle-helper">{price}</span></td>
          </tr>
        </table>
        </body></html>"#
    )
}

const INTERSTITIAL_PAGE: &str = "<html><h1>Checking your browser</h1></html>";

const NO_AVAILABILITY_PAGE: &str = r#"<html><body>
    <div id="no_availability_msg">Não há quartos disponíveis nas datas selecionadas</div>
    </body></html>"#;

#[tokio::test]
async fn fetch_returns_page_body_and_sends_language() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HOTEL_PATH))
        .and(headers("accept-language", vec!["pt-BR", "pt;q=0.9"]))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new(&fast_fetcher_config()).unwrap();
    let body = fetcher
        .fetch(&format!("{}{HOTEL_PATH}", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn rate_limited_response_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new(&fast_fetcher_config()).unwrap();
    let err = fetcher
        .fetch(&format!("{}{HOTEL_PATH}", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("429"), "{err}");
}

#[tokio::test]
async fn server_error_is_navigation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new(&fast_fetcher_config()).unwrap();
    let err = fetcher
        .fetch(&format!("{}{HOTEL_PATH}", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, RateShopperError::FetchNavigation { .. }));
}

#[tokio::test]
async fn slow_response_is_fetch_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new(&fast_fetcher_config()).unwrap();
    let err = fetcher
        .fetch(&format!("{}{HOTEL_PATH}", server.uri()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, RateShopperError::FetchTimeout { timeout_secs: 1, .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn interstitial_is_retried_and_parsed_result_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HOTEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(INTERSTITIAL_PAGE))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HOTEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(table_page("R$ 300,00")))
        .with_priority(10)
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Arc::new(HttpPageFetcher::new(&fast_fetcher_config()).unwrap());
    let cache = Arc::new(MemoryAvailabilityCache::new(16, Duration::from_secs(60)));
    let engine = BundleResolutionEngine::new(fetcher, &EngineConfig::default())
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        })
        .with_cache(cache.clone());
    let request = RunRequest {
        property_url: format!("{}{HOTEL_PATH}", server.uri()),
        date_range: DateRange::parse("2025-09-11", "2025-09-11").unwrap(),
        max_bundle_size: 1,
        min_occupancy: 2,
    };

    let sink = MemorySink::new();
    let summary = engine
        .run(&request, &sink, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.prices_extracted, 1);
    assert_eq!(summary.errors_count, 0);
    assert!((sink.rows()[0].price - 300.0).abs() < 1e-9);
    assert_eq!(cache.len(), 1);

    // Same trial again: answered from the cache, no third request
    let summary = engine
        .run(&request, &MemorySink::new(), None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.prices_extracted, 1);
    // wiremock verifies expect(1) on both mocks on drop
}

#[tokio::test]
async fn engine_over_http_writes_csv_rows() {
    let server = MockServer::start().await;

    // Only a two-night stay from 09-13 is bookable
    Mock::given(method("GET"))
        .and(path(HOTEL_PATH))
        .and(query_param("group_adults", "2"))
        .and(query_param("checkin", "2025-09-13"))
        .and(query_param("checkout", "2025-09-15"))
        .respond_with(ResponseTemplate::new(200).set_body_string(table_page("R$ 1.250,00")))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HOTEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(NO_AVAILABILITY_PAGE))
        .with_priority(10)
        .mount(&server)
        .await;

    let fetcher = Arc::new(HttpPageFetcher::new(&fast_fetcher_config()).unwrap());
    let engine = BundleResolutionEngine::new(fetcher, &EngineConfig::default()).with_retry_policy(
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        },
    );

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("rates.csv");
    let sink = CsvFileSink::open(&csv_path).unwrap();

    let request = RunRequest {
        property_url: format!("{}{HOTEL_PATH}?group_adults=2&checkin=2020-01-01", server.uri()),
        date_range: DateRange::parse("2025-09-13", "2025-09-14").unwrap(),
        max_bundle_size: 3,
        min_occupancy: 2,
    };
    let summary = engine
        .run(&request, &sink, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.prices_extracted, 2);
    assert_eq!(summary.errors_count, 0);

    let content = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "2025-09-13;2025-09-14;R$ 625,00;2-night bundle",
            "2025-09-14;2025-09-15;R$ 625,00;2-night bundle",
        ]
    );
}

#[tokio::test]
async fn engine_retries_server_errors_then_escalates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("checkout", "2025-09-11"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("checkout", "2025-09-12"))
        .respond_with(ResponseTemplate::new(200).set_body_string(table_page("R$ 400,00")))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Arc::new(HttpPageFetcher::new(&fast_fetcher_config()).unwrap());
    let engine = BundleResolutionEngine::new(fetcher, &EngineConfig::default()).with_retry_policy(
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
    );
    let request = RunRequest {
        property_url: format!("{}{HOTEL_PATH}", server.uri()),
        date_range: DateRange::parse("2025-09-10", "2025-09-10").unwrap(),
        max_bundle_size: 3,
        min_occupancy: 2,
    };
    let sink = MemorySink::new();
    let summary = engine
        .run(&request, &sink, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.errors_count, 1);
    assert_eq!(summary.prices_extracted, 1);
    assert!((sink.rows()[0].price - 200.0).abs() < 1e-9);
}
