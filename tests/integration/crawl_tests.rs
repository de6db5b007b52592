//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers for the fetcher and
//! the geocoder, and scripted in-process collaborators to drive the crawl
//! controller through its termination and failure paths.

use async_trait::async_trait;
use listing_harvester::config::{load_config, Config, CrawlerConfig};
use listing_harvester::crawler::{
    build_http_client, CrawlController, CoordinateResolver, DetailFetchPool, Extractor,
    HtmlExtractor, PageFetcher, PoolSettings, ReqwestPageFetcher,
};
use listing_harvester::dedup::Deduplicator;
use listing_harvester::geocoding::NominatimResolver;
use listing_harvester::listing::{DetailFields, ListingRecord};
use listing_harvester::state::TerminalReason;
use listing_harvester::storage::{
    CheckpointStore, ListingFilter, ListingStore, MemoryCheckpointStore, SqliteStorage,
};
use listing_harvester::{FetchError, HarvestError};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_URL: &str = "https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/cala-polska";

/// Loads a configuration with all delays zeroed; `crawler_extra` lines go
/// into the `[crawler]` table, `tail` is appended after it
fn create_test_config(base_url: &str, crawler_extra: &str, tail: &str) -> Config {
    let content = format!(
        r#"
[crawler]
base-url = "{base_url}"
page-delay-ms = 0
transient-backoff-ms = 1
error-delay-ms = 0
detail-jitter-min-ms = 0
detail-jitter-max-ms = 0
enrichment-delay-ms = 0
{crawler_extra}

[output]
database-path = "./unused.db"

{tail}
"#
    );

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    load_config(file.path()).unwrap()
}

fn crawler_config(extra: &str) -> CrawlerConfig {
    create_test_config(BASE_URL, extra, "").crawler
}

// ===== Scripted collaborators =====

fn page_number(url: &str) -> u32 {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(1)
}

/// Serves canned responses per page number; the last response of a page repeats
struct ScriptedFetcher {
    responses: Mutex<HashMap<u32, VecDeque<Result<String, FetchError>>>>,
    fetched: Mutex<Vec<u32>>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn page(self, page: u32, responses: Vec<Result<String, FetchError>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(page, responses.into_iter().collect());
        self
    }

    fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let page = page_number(url);
        self.fetched.lock().unwrap().push(page);

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&page) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok("END".to_string()),
        }
    }
}

/// Page bodies are lines: `LISTING <url>`, `TOTAL <n>`, plus `END`, `NAV`
/// and `BROKEN` markers
struct ScriptedExtractor {
    slow_delay: Duration,
}

impl ScriptedExtractor {
    fn new() -> Self {
        Self {
            slow_delay: Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn extract_stubs(&self, page: &str) -> Vec<ListingRecord> {
        page.lines()
            .filter_map(|line| line.trim().strip_prefix("LISTING "))
            .map(|url| ListingRecord::new(url, format!("Listing {}", url), "otodom.pl"))
            .collect()
    }

    fn has_end_marker(&self, page: &str) -> bool {
        page.contains("END")
    }

    fn has_pagination(&self, page: &str) -> bool {
        page.contains("NAV")
    }

    fn total_results(&self, page: &str) -> Option<u32> {
        page.lines()
            .find_map(|line| line.trim().strip_prefix("TOTAL "))
            .and_then(|n| n.parse().ok())
    }

    fn page_loaded(&self, page: &str) -> bool {
        !page.contains("BROKEN")
    }

    async fn extract_details(&self, url: &str) -> Result<DetailFields, FetchError> {
        if url.contains("slow") {
            tokio::time::sleep(self.slow_delay).await;
        }
        Ok(DetailFields {
            floor: Some(1),
            ..Default::default()
        })
    }
}

fn listing_page(page: u32, count: usize) -> Result<String, FetchError> {
    let mut body = String::from("NAV\n");
    for n in 0..count {
        body.push_str(&format!("LISTING https://www.otodom.pl/pl/oferta/p{}-{}\n", page, n));
    }
    Ok(body)
}

fn blocked(page: u32) -> Result<String, FetchError> {
    Err(FetchError::Blocked {
        url: format!("{}?page={}", BASE_URL, page),
        message: "HTTP 403 Forbidden".to_string(),
    })
}

fn skippable(page: u32) -> Result<String, FetchError> {
    Err(FetchError::Other {
        url: format!("{}?page={}", BASE_URL, page),
        message: "HTTP 404 Not Found".to_string(),
    })
}

fn transient(page: u32) -> Result<String, FetchError> {
    Err(FetchError::Transient {
        url: format!("{}?page={}", BASE_URL, page),
        message: "operation timed out".to_string(),
    })
}

fn controller(settings: CrawlerConfig, fetcher: Arc<ScriptedFetcher>) -> CrawlController {
    CrawlController::new(
        settings,
        fetcher,
        Arc::new(ScriptedExtractor::new()),
        Deduplicator::from_config(&Default::default()),
    )
    .unwrap()
}

// ===== Scripted controller scenarios =====

#[tokio::test]
async fn test_block_on_page_four_aborts_immediately() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![listing_page(2, 2)])
            .page(3, vec![listing_page(3, 2)])
            .page(4, vec![blocked(4)])
            .page(5, vec![listing_page(5, 2)]),
    );
    let checkpoints = Arc::new(Mutex::new(MemoryCheckpointStore::new()));

    let mut crawl = controller(crawler_config("resume = true"), fetcher.clone())
        .with_checkpoints(Box::new(Arc::clone(&checkpoints)));
    let outcome = crawl.run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::BlockDetected);
    assert!(!outcome.is_done());
    assert_eq!(fetcher.fetched(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.listings.len(), 6);

    // Aborted runs keep the checkpoint at the page that failed
    assert_eq!(checkpoints.load(BASE_URL).unwrap(), Some(4));
}

#[tokio::test]
async fn test_three_skippable_errors_abort_after_page_four() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 3)])
            .page(2, vec![skippable(2)])
            .page(3, vec![skippable(3)])
            .page(4, vec![skippable(4)])
            .page(5, vec![listing_page(5, 3)]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::ErrorThreshold);
    assert_eq!(fetcher.fetched(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.listings.len(), 3);
}

#[tokio::test]
async fn test_success_resets_error_count() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![skippable(1)])
            .page(2, vec![skippable(2)])
            .page(3, vec![listing_page(3, 1)])
            .page(4, vec![skippable(4)])
            .page(5, vec![skippable(5)])
            .page(6, vec![Ok("END".to_string())]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_transient_errors_retry_same_page() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 1)])
            .page(2, vec![transient(2), transient(2), listing_page(2, 1)])
            .page(3, vec![Ok("END".to_string())]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![1, 2, 2, 2, 3]);
    assert_eq!(outcome.listings.len(), 2);
}

#[tokio::test]
async fn test_exhausted_transient_retries_skip_the_page() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![transient(1)])
            .page(2, vec![Ok("END".to_string())]),
    );

    let outcome = controller(crawler_config("max-transient-retries = 2"), fetcher.clone())
        .run()
        .await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![1, 1, 1, 2]);
}

#[tokio::test]
async fn test_empty_page_termination_reasons() {
    let cases = [
        ("END\nNAV", TerminalReason::EmptyWithEndMarkers),
        ("<html></html>", TerminalReason::EmptyNoPagination),
    ];

    for (body, expected) in cases {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(1, vec![listing_page(1, 2)])
                .page(2, vec![Ok(body.to_string())]),
        );
        let outcome = controller(crawler_config(""), fetcher.clone()).run().await;
        assert_eq!(outcome.terminal_reason, expected, "body {:?}", body);
        assert_eq!(fetcher.fetched(), vec![1, 2]);
    }
}

#[tokio::test]
async fn test_empty_page_inside_window_is_retried() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![Ok("NAV".to_string())]),
    );

    let outcome = controller(crawler_config("empty-page-retries = 2"), fetcher.clone())
        .run()
        .await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyResults);
    assert_eq!(fetcher.fetched(), vec![1, 2, 2, 2]);
}

#[tokio::test]
async fn test_empty_page_recovers_after_retry() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![Ok("NAV".to_string()), listing_page(1, 2)])
            .page(2, vec![Ok("END".to_string())]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![1, 1, 2]);
    assert_eq!(outcome.listings.len(), 2);
}

#[tokio::test]
async fn test_empty_page_outside_window_ends_crawl() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 1)])
            .page(2, vec![listing_page(2, 1)])
            .page(3, vec![Ok("NAV".to_string())]),
    );

    let outcome = controller(crawler_config("empty-page-retry-window = 2"), fetcher.clone())
        .run()
        .await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyResults);
    assert_eq!(fetcher.fetched(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_page_limit_stops_crawl() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![listing_page(2, 2)])
            .page(3, vec![listing_page(3, 2)]),
    );

    let outcome = controller(crawler_config("max-pages = 2"), fetcher.clone())
        .run()
        .await;

    assert_eq!(outcome.terminal_reason, TerminalReason::PageLimit);
    assert_eq!(fetcher.fetched(), vec![1, 2]);
    assert_eq!(outcome.listings.len(), 4);
}

fn with_total(page: Result<String, FetchError>, total: u32) -> Result<String, FetchError> {
    page.map(|body| format!("{}TOTAL {}\n", body, total))
}

#[tokio::test]
async fn test_sparse_page_past_result_total_ends_crawl() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 24)])
            .page(2, vec![listing_page(2, 24)])
            .page(3, vec![listing_page(3, 12)])
            .page(4, vec![with_total(listing_page(4, 5), 60)])
            .page(5, vec![listing_page(5, 5)]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    // 60 results make 60 / 24 + 1 = 3 pages
    assert_eq!(outcome.terminal_reason, TerminalReason::ResultsExhausted);
    assert!(outcome.is_done());
    assert_eq!(fetcher.fetched(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.listings.len(), 60);
    assert!(outcome.listings.iter().all(|l| l.source_page <= 3));
}

#[tokio::test]
async fn test_sparse_page_within_result_total_continues() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 1)])
            .page(4, vec![with_total(listing_page(4, 5), 100)])
            .page(5, vec![Ok("END".to_string())]),
    );
    let checkpoints = Arc::new(Mutex::new(MemoryCheckpointStore::new()));
    {
        let mut store = Arc::clone(&checkpoints);
        store.save(BASE_URL, 4).unwrap();
    }

    let mut crawl = controller(crawler_config("resume = true"), fetcher.clone())
        .with_checkpoints(Box::new(Arc::clone(&checkpoints)));
    let outcome = crawl.run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![4, 5]);
    assert_eq!(outcome.listings.len(), 5);
}

#[tokio::test]
async fn test_unrendered_page_is_fetched_again() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![Ok("BROKEN".to_string()), listing_page(2, 2)])
            .page(3, vec![Ok("END".to_string())]),
    );

    let outcome = controller(crawler_config(""), fetcher.clone()).run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(fetcher.fetched(), vec![1, 2, 2, 3]);
    assert_eq!(outcome.listings.len(), 4);
}

#[tokio::test]
async fn test_unrendered_page_retries_are_bounded() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![Ok("BROKEN".to_string())]),
    );

    let outcome = controller(crawler_config("max-transient-retries = 2"), fetcher.clone())
        .run()
        .await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyNoPagination);
    assert_eq!(fetcher.fetched(), vec![1, 2, 2, 2]);
}

#[tokio::test]
async fn test_termination_is_deterministic() {
    let script = || {
        Arc::new(
            ScriptedFetcher::new()
                .page(1, vec![listing_page(1, 3)])
                .page(2, vec![transient(2), listing_page(2, 3)])
                .page(3, vec![skippable(3)])
                .page(4, vec![Ok("NAV".to_string())]),
        )
    };

    let mut reasons = Vec::new();
    let mut fetch_logs = Vec::new();
    for _ in 0..3 {
        let fetcher = script();
        let outcome = controller(crawler_config(""), fetcher.clone()).run().await;
        reasons.push(outcome.terminal_reason);
        fetch_logs.push(fetcher.fetched());
    }

    assert!(reasons.iter().all(|r| *r == reasons[0]));
    assert!(fetch_logs.iter().all(|log| *log == fetch_logs[0]));
    assert_eq!(reasons[0], TerminalReason::EmptyResults);
}

#[tokio::test]
async fn test_resume_starts_at_checkpoint_and_clears_on_done() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(3, vec![listing_page(3, 2)])
            .page(4, vec![Ok("END".to_string())]),
    );
    let checkpoints = Arc::new(Mutex::new(MemoryCheckpointStore::new()));
    {
        let mut store = Arc::clone(&checkpoints);
        store.save(BASE_URL, 3).unwrap();
    }

    let mut crawl = controller(crawler_config("resume = true"), fetcher.clone())
        .with_checkpoints(Box::new(Arc::clone(&checkpoints)));
    let outcome = crawl.run().await;

    assert!(outcome.is_done());
    assert_eq!(fetcher.fetched(), vec![3, 4]);
    assert!(outcome.listings.iter().all(|l| l.source_page == 3));
    assert_eq!(checkpoints.load(BASE_URL).unwrap(), None);
}

#[tokio::test]
async fn test_checkpoint_ignored_without_resume() {
    let fetcher = Arc::new(ScriptedFetcher::new().page(1, vec![Ok("END".to_string())]));
    let checkpoints = Arc::new(Mutex::new(MemoryCheckpointStore::new()));
    {
        let mut store = Arc::clone(&checkpoints);
        store.save(BASE_URL, 9).unwrap();
    }

    let mut crawl = controller(crawler_config(""), fetcher.clone())
        .with_checkpoints(Box::new(Arc::clone(&checkpoints)));
    crawl.run().await;

    assert_eq!(fetcher.fetched(), vec![1]);
    assert_eq!(checkpoints.load(BASE_URL).unwrap(), Some(9));
}

#[tokio::test]
async fn test_batches_flush_at_threshold_and_survive_callback_failure() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 3)])
            .page(2, vec![listing_page(2, 2)])
            .page(3, vec![Ok("END".to_string())]),
    );

    let batches: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&batches);
    let mut calls = 0;

    let mut crawl = controller(crawler_config("batch-size = 2"), fetcher).with_batch_callback(
        Box::new(move |batch: &[ListingRecord]| {
            calls += 1;
            seen.lock().unwrap().push(batch.len());
            if calls == 1 {
                Err(HarvestError::Io(std::io::Error::other("disk full")))
            } else {
                Ok(batch.len())
            }
        }),
    );
    let outcome = crawl.run().await;

    // 5 listings: two full batches plus the residual flush
    assert_eq!(*batches.lock().unwrap(), vec![2, 2, 1]);
    assert_eq!(outcome.batches_flushed, 3);
    assert_eq!(outcome.batches_failed, 1);
    assert_eq!(outcome.listings_saved, 3);
    assert_eq!(outcome.listings.len(), 5);
}

#[tokio::test]
async fn test_listings_are_stamped_with_page_and_position() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(1, vec![listing_page(1, 2)])
            .page(2, vec![listing_page(2, 3)]),
    );

    let outcome = controller(crawler_config("max-pages = 2"), fetcher)
        .run()
        .await;

    let p2: Vec<u32> = outcome
        .listings
        .iter()
        .filter(|l| l.source_page == 2)
        .map(|l| l.source_position)
        .collect();
    let mut sorted = p2.clone();
    sorted.sort();
    assert_eq!(sorted, vec![1, 2, 3]);
    assert!(outcome.listings.iter().all(|l| l.floor == Some(1)));
}

// ===== Detail fetch pool =====

#[tokio::test]
async fn test_timed_out_enrichment_keeps_stub() {
    let pool = DetailFetchPool::new(
        Arc::new(ScriptedExtractor::new()),
        PoolSettings {
            task_timeout: Duration::from_millis(100),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            enrichment_delay: Duration::ZERO,
            country: "Polska".to_string(),
        },
    );

    let stubs: Vec<ListingRecord> = ["fast-1", "slow-1", "fast-2"]
        .iter()
        .map(|id| {
            ListingRecord::new(
                format!("https://www.otodom.pl/pl/oferta/{}", id),
                *id,
                "otodom.pl",
            )
        })
        .collect();
    let slow_stub = stubs[1].clone();

    let enriched = pool.enrich(stubs, false, 4).await;

    assert_eq!(enriched.len(), 3);
    let slow = enriched.iter().find(|l| l.url == slow_stub.url).unwrap();
    assert_eq!(*slow, slow_stub);
    assert_eq!(enriched.iter().filter(|l| l.floor == Some(1)).count(), 2);
}

// ===== HTTP collaborators against wiremock =====

#[tokio::test]
async fn test_fetcher_classifies_responses() {
    let mock_server = MockServer::start().await;

    for (route, status) in [("/forbidden", 403), ("/unavailable", 503), ("/missing", 404), ("/slow-down", 429)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/captcha"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Potwierdź, że nie jesteś robotem</h1>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(BASE_URL, "", "");
    let client = build_http_client(&config.user_agent).unwrap();
    let fetcher = ReqwestPageFetcher::new(client)
        .with_block_markers(vec!["nie jesteś robotem".to_string()]);
    let uri = mock_server.uri();

    assert!(fetcher.fetch(&format!("{}/forbidden", uri)).await.unwrap_err().is_blocked());
    assert!(fetcher.fetch(&format!("{}/captcha", uri)).await.unwrap_err().is_blocked());
    assert!(fetcher.fetch(&format!("{}/unavailable", uri)).await.unwrap_err().is_transient());
    assert!(fetcher.fetch(&format!("{}/slow-down", uri)).await.unwrap_err().is_transient());

    let missing = fetcher.fetch(&format!("{}/missing", uri)).await.unwrap_err();
    assert!(matches!(missing, FetchError::Other { .. }));

    assert_eq!(fetcher.fetch(&format!("{}/ok", uri)).await.unwrap(), "<html>ok</html>");
}

#[tokio::test]
async fn test_fetcher_connection_failure_is_transient() {
    let config = create_test_config(BASE_URL, "", "");
    let fetcher = ReqwestPageFetcher::new(build_http_client(&config.user_agent).unwrap());

    // Nothing listens on port 9 of localhost
    let err = fetcher.fetch("http://127.0.0.1:9/wyniki").await.unwrap_err();
    assert!(err.is_transient(), "{:?}", err);
}

#[tokio::test]
async fn test_nominatim_resolver() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Kanarkowa, Olsztyn, Polska"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .and(query_param("countrycodes", "pl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"lat": "53.7392", "lon": "20.4211", "display_name": "Kanarkowa"}]"#),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Berlin, Polska"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"lat": "52.52", "lon": "13.40"}]"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Nieistniejąca, Polska"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Awaria, Polska"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        BASE_URL,
        "",
        &format!("[geocoding]\nendpoint = \"{}/search\"\nmax-retries = 2", mock_server.uri()),
    );
    let client = build_http_client(&config.user_agent).unwrap();
    let resolver = NominatimResolver::new(client, &config.geocoding)
        .with_backoff_unit(Duration::from_millis(1));

    assert_eq!(
        resolver.resolve("Kanarkowa, Olsztyn, Polska").await,
        Some((53.7392, 20.4211))
    );
    assert_eq!(resolver.resolve("Berlin, Polska").await, None);
    assert_eq!(resolver.resolve("Nieistniejąca, Polska").await, None);
    assert_eq!(resolver.resolve("Awaria, Polska").await, None);
}

const RESULTS_PAGE_ONE: &str = r#"
<html><body>
  <li data-cy="listing-item">
    <a data-cy="listing-item-link" href="/pl/oferta/olsztyn-gutkowo"><p data-cy="listing-item-title">Trzy pokoje z ogródkiem, Gutkowo</p></a>
    <span data-cy="listing-item-price">489 000 zł</span>
    <p data-cy="listing-item-location">ul. Kanarkowa, Gutkowo, Olsztyn, warmińsko-mazurskie</p>
    <dl><dt>Liczba pokoi</dt><dd>3</dd><dt>Powierzchnia</dt><dd>64,2 m²</dd></dl>
  </li>
  <li data-cy="listing-item">
    <a data-cy="listing-item-link" href="/pl/oferta/olsztyn-centrum"><p data-cy="listing-item-title">Kawalerka w centrum</p></a>
    <span data-cy="listing-item-price">299 000 zł</span>
    <p data-cy="listing-item-location">Śródmieście, Olsztyn, warmińsko-mazurskie</p>
  </li>
  <nav data-cy="pagination"><a title="następna">›</a></nav>
</body></html>
"#;

const RESULTS_PAGE_TWO: &str = r#"
<html><body>
  <li data-cy="listing-item">
    <a data-cy="listing-item-link" href="/pl/oferta/olsztyn-gutkowo"><p data-cy="listing-item-title">Trzy pokoje z ogródkiem, Gutkowo</p></a>
    <span data-cy="listing-item-price">489 000 zł</span>
  </li>
  <nav data-cy="pagination"><a title="następna">›</a></nav>
</body></html>
"#;

const DETAIL_PAGE: &str = r#"
<html><body>
  <dl><dt>Piętro</dt><dd>2/4</dd><dt>Rok budowy</dt><dd>2012</dd><dt>Rynek</dt><dd>wtórny</dd></dl>
  <ul><li>piwnica</li></ul>
  <p>ID: 65011234</p>
</body></html>
"#;

#[tokio::test]
async fn test_full_crawl_against_mock_site() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/pl/wyniki"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE_TWO))
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pl/wyniki"))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>Otodom</h1><h2>Brak wyników</h2></body></html>"),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pl/wyniki"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE_ONE))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pl/oferta/olsztyn-gutkowo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pl/oferta/olsztyn-centrum"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"lat": "53.7392", "lon": "20.4211"}]"#))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &format!("{}/pl/wyniki", uri),
        "batch-size = 0",
        &format!("[geocoding]\nendpoint = \"{}/search\"", uri),
    );

    let storage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("listings.db")).unwrap(),
    ));
    let client = build_http_client(&config.user_agent).unwrap();
    let fetcher = Arc::new(ReqwestPageFetcher::new(client.clone()));
    let extractor = Arc::new(HtmlExtractor::new(
        fetcher.clone(),
        Url::parse(&config.crawler.base_url).unwrap(),
        config.crawler.source.clone(),
        &config.extractor,
    ));
    let resolver = Arc::new(NominatimResolver::new(client, &config.geocoding));

    let mut store = Arc::clone(&storage);
    let mut crawl = CrawlController::from_config(&config, fetcher, extractor)
        .unwrap()
        .with_resolver(resolver)
        .with_batch_callback(Box::new(move |batch: &[ListingRecord]| {
            store.save_batch(batch).map_err(HarvestError::from)
        }));
    let outcome = crawl.run().await;

    assert_eq!(outcome.terminal_reason, TerminalReason::EmptyWithEndMarkers);
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.listings.len(), 3);

    // The listing re-surfaced on page 2 shares its url and is merged away
    assert_eq!(outcome.batches_flushed, 1);
    assert_eq!(outcome.listings_saved, 2);
    assert_eq!(storage.count_listings(ListingFilter::All).unwrap(), 2);

    let gutkowo = storage
        .get_listing(&format!("{}/pl/oferta/olsztyn-gutkowo", uri))
        .unwrap()
        .unwrap();
    assert_eq!(gutkowo.price, Some(489_000.0));
    assert_eq!(gutkowo.area, Some(64.2));
    assert_eq!(gutkowo.rooms, Some(3));
    assert_eq!(gutkowo.city.as_deref(), Some("Olsztyn"));
    assert_eq!(gutkowo.floor, Some(2));
    assert_eq!(gutkowo.total_floors, Some(4));
    assert_eq!(gutkowo.year_of_construction, Some(2012));
    assert_eq!(gutkowo.listing_id.as_deref(), Some("65011234"));
    assert!(gutkowo.has_garden);
    assert!(gutkowo.has_basement);
    assert_eq!(gutkowo.latitude, Some(53.7392));
    assert_eq!(gutkowo.longitude, Some(20.4211));

    // A failed detail fetch keeps the stub, without coordinates
    let centrum = storage
        .get_listing(&format!("{}/pl/oferta/olsztyn-centrum", uri))
        .unwrap()
        .unwrap();
    assert_eq!(centrum.price, Some(299_000.0));
    assert_eq!(centrum.floor, None);
    assert!(!centrum.is_geocoded());
}
