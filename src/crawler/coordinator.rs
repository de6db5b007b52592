//! Crawl controller - main crawl orchestration logic
//!
//! This module contains the page loop that coordinates all aspects of the
//! crawling process, including:
//! - Resuming from and persisting checkpoints
//! - Fetching, parsing and enriching one results page at a time
//! - Classifying fetch failures and deciding when to stop
//! - Buffering listings and flushing deduplicated batches

use crate::config::{Config, CrawlerConfig};
use crate::crawler::pool::{jitter, DetailFetchPool, PoolSettings};
use crate::crawler::traits::{CoordinateResolver, Extractor, PageFetcher};
use crate::dedup::Deduplicator;
use crate::listing::ListingRecord;
use crate::output::generate_duplicate_report;
use crate::state::{CrawlState, TerminalReason};
use crate::storage::CheckpointStore;
use crate::{FetchError, HarvestError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Receives each deduplicated batch; returns how many listings were stored
pub type BatchCallback =
    Box<dyn FnMut(&[ListingRecord]) -> Result<usize, HarvestError> + Send>;

/// Result of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Every listing collected during the run, before deduplication
    pub listings: Vec<ListingRecord>,
    pub terminal_reason: TerminalReason,
    pub pages_fetched: u32,
    pub batches_flushed: usize,
    /// Sum of the counts returned by the batch callback
    pub listings_saved: usize,
    /// Batches whose callback failed; their listings were not stored
    pub batches_failed: usize,
}

impl CrawlOutcome {
    pub fn is_done(&self) -> bool {
        self.terminal_reason.is_done()
    }
}

/// Builds the URL of a results page
///
/// Any `page_param` pair already in the base URL is dropped. Page 1 carries
/// no page parameter; later pages append `page_param=N`.
pub fn page_url(base: &Url, page_param: &str, page: u32) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != page_param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    if page <= 1 && retained.is_empty() {
        url.set_query(None);
        return url;
    }

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear().extend_pairs(retained);
        if page > 1 {
            pairs.append_pair(page_param, &page.to_string());
        }
    }
    url
}

/// Pages after this one are checked against the advertised result total
const SPARSE_CHECK_AFTER_PAGE: u32 = 3;
/// A page with fewer listings than this counts as sparse
const SPARSE_PAGE_LISTINGS: usize = 10;
/// Listings per results page on the source
const RESULTS_PER_PAGE: u32 = 24;

/// Exponential backoff: `base * 2^attempt`
fn transient_backoff(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.min(10))
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// States of the page loop
enum Step {
    FetchPage,
    Parse(String),
    CheckTermination(String),
    DetailFetch(Vec<ListingRecord>),
    BufferAndFlush(Vec<ListingRecord>),
    AdvancePage,
    Done,
    Aborted,
}

/// Mutable data of one run, owned by `run`
#[derive(Default)]
struct RunContext {
    state: CrawlState,
    buffer: Vec<ListingRecord>,
    collected: Vec<ListingRecord>,
    batches_flushed: usize,
    listings_saved: usize,
    batches_failed: usize,
}

/// Main crawl controller structure
pub struct CrawlController {
    settings: CrawlerConfig,
    base_url: Url,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    pool: DetailFetchPool,
    deduplicator: Deduplicator,
    checkpoints: Option<Box<dyn CheckpointStore>>,
    batch_callback: Option<BatchCallback>,
}

impl CrawlController {
    /// Creates a controller for the given crawl settings
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlController)` - Ready to run
    /// * `Err(HarvestError)` - `base_url` is not a valid URL
    pub fn new(
        settings: CrawlerConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        deduplicator: Deduplicator,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&settings.base_url)?;
        let pool_settings = PoolSettings {
            task_timeout: Duration::from_secs(settings.task_timeout_secs),
            jitter_min: Duration::from_millis(settings.detail_jitter_min_ms),
            jitter_max: Duration::from_millis(settings.detail_jitter_max_ms),
            enrichment_delay: Duration::from_millis(settings.enrichment_delay_ms),
            ..PoolSettings::default()
        };

        Ok(Self {
            pool: DetailFetchPool::new(Arc::clone(&extractor), pool_settings),
            settings,
            base_url,
            fetcher,
            extractor,
            deduplicator,
            checkpoints: None,
            batch_callback: None,
        })
    }

    /// Creates a controller from a full configuration
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, HarvestError> {
        let controller = Self::new(
            config.crawler.clone(),
            fetcher,
            Arc::clone(&extractor),
            Deduplicator::from_config(&config.dedup),
        )?;
        let pool = DetailFetchPool::new(
            extractor,
            PoolSettings::from_config(&config.crawler, &config.geocoding),
        );
        Ok(controller.with_pool(pool))
    }

    /// Replaces the detail fetch pool
    pub fn with_pool(mut self, pool: DetailFetchPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CoordinateResolver>) -> Self {
        self.pool = self.pool.with_resolver(resolver);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Box<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_batch_callback(mut self, callback: BatchCallback) -> Self {
        self.batch_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &CrawlerConfig {
        &self.settings
    }

    /// URL of the given results page
    pub fn page_url(&self, page: u32) -> Url {
        page_url(&self.base_url, &self.settings.page_param, page)
    }

    /// Runs the page loop until a terminal reason is reached
    ///
    /// Page-level failures never escape: they end up as the outcome's
    /// terminal reason. Listings still buffered at the end are flushed.
    pub async fn run(&mut self) -> CrawlOutcome {
        let mut ctx = RunContext {
            state: CrawlState::new(self.start_page()),
            ..Default::default()
        };

        info!(
            "Starting crawl of {} at page {}",
            self.settings.base_url, ctx.state.current_page
        );

        let mut step = Step::FetchPage;
        loop {
            step = match step {
                Step::FetchPage => self.fetch_page(&mut ctx).await,
                Step::Parse(page) => self.parse(&mut ctx, page),
                Step::CheckTermination(page) => self.check_termination(&mut ctx, &page).await,
                Step::DetailFetch(stubs) => {
                    let enriched = self
                        .pool
                        .enrich(
                            stubs,
                            self.settings.enable_enrichment,
                            self.settings.max_workers,
                        )
                        .await;
                    Step::BufferAndFlush(enriched)
                }
                Step::BufferAndFlush(listings) => {
                    self.buffer_and_flush(&mut ctx, listings);
                    Step::AdvancePage
                }
                Step::AdvancePage => self.advance(&mut ctx).await,
                Step::Done | Step::Aborted => break,
            };
        }

        self.flush(&mut ctx);

        // Every path into Done or Aborted sets a reason first
        let terminal_reason = ctx
            .state
            .terminal_reason()
            .unwrap_or(TerminalReason::EmptyResults);

        if terminal_reason.is_done() {
            self.clear_checkpoint();
            info!(
                "Crawl finished ({}): {} pages, {} listings",
                terminal_reason,
                ctx.state.pages_fetched,
                ctx.collected.len()
            );
        } else {
            error!(
                "Crawl aborted ({}) at page {}: {} listings collected",
                terminal_reason,
                ctx.state.current_page,
                ctx.collected.len()
            );
        }

        CrawlOutcome {
            listings: ctx.collected,
            terminal_reason,
            pages_fetched: ctx.state.pages_fetched,
            batches_flushed: ctx.batches_flushed,
            listings_saved: ctx.listings_saved,
            batches_failed: ctx.batches_failed,
        }
    }

    fn start_page(&self) -> u32 {
        if !self.settings.resume {
            return 1;
        }
        let Some(store) = self.checkpoints.as_ref() else {
            return 1;
        };

        match store.load(&self.settings.base_url) {
            Ok(Some(page)) => {
                info!("Resuming from checkpoint at page {}", page);
                page.max(1)
            }
            Ok(None) => 1,
            Err(e) => {
                warn!("Failed to load checkpoint, starting at page 1: {}", e);
                1
            }
        }
    }

    fn save_checkpoint(&mut self, next_page: u32) {
        if !self.settings.resume {
            return;
        }
        if let Some(store) = self.checkpoints.as_mut() {
            if let Err(e) = store.save(&self.settings.base_url, next_page) {
                warn!("Failed to save checkpoint: {}", e);
            }
        }
    }

    fn clear_checkpoint(&mut self) {
        if !self.settings.resume {
            return;
        }
        if let Some(store) = self.checkpoints.as_mut() {
            if let Err(e) = store.clear(&self.settings.base_url) {
                warn!("Failed to clear checkpoint: {}", e);
            }
        }
    }

    fn page_limit_reached(&self, page: u32) -> bool {
        self.settings.max_pages > 0 && page > self.settings.max_pages
    }

    async fn fetch_page(&mut self, ctx: &mut RunContext) -> Step {
        let page = ctx.state.current_page;
        if self.page_limit_reached(page) {
            info!("Page limit of {} reached", self.settings.max_pages);
            ctx.state.terminate(TerminalReason::PageLimit);
            return Step::Done;
        }

        let url = self.page_url(page);
        info!("Fetching page {}: {}", page, url);

        match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => {
                ctx.state.pages_fetched += 1;
                ctx.state.record_success();
                Step::Parse(body)
            }
            Err(e) if e.is_blocked() => {
                error!("Blocked on page {}: {}", page, e);
                ctx.state.terminate(TerminalReason::BlockDetected);
                Step::Aborted
            }
            Err(e)
                if e.is_transient()
                    && ctx.state.transient_attempts < self.settings.max_transient_retries =>
            {
                let attempt = ctx.state.transient_attempts;
                ctx.state.transient_attempts += 1;
                let delay = transient_backoff(
                    Duration::from_millis(self.settings.transient_backoff_ms),
                    attempt,
                );
                warn!(
                    "Transient failure on page {} (attempt {}/{}), retrying in {:?}: {}",
                    page,
                    attempt + 1,
                    self.settings.max_transient_retries,
                    delay,
                    e
                );
                pause(delay).await;
                Step::FetchPage
            }
            Err(e) => self.skip_page(ctx, e).await,
        }
    }

    async fn skip_page(&mut self, ctx: &mut RunContext, e: FetchError) -> Step {
        let page = ctx.state.current_page;
        let errors = ctx.state.record_error();
        warn!(
            "Skipping page {} ({}/{} consecutive errors): {}",
            page, errors, self.settings.max_consecutive_errors, e
        );

        if errors >= self.settings.max_consecutive_errors {
            error!("Too many consecutive errors, stopping at page {}", page);
            ctx.state.terminate(TerminalReason::ErrorThreshold);
            return Step::Aborted;
        }

        pause(Duration::from_millis(self.settings.error_delay_ms)).await;
        Step::AdvancePage
    }

    fn parse(&mut self, ctx: &mut RunContext, body: String) -> Step {
        let page = ctx.state.current_page;
        let stubs: Vec<ListingRecord> = self
            .extractor
            .extract_stubs(&body)
            .into_iter()
            .filter(|stub| !stub.url.is_empty())
            .enumerate()
            .map(|(position, mut stub)| {
                stub.source_page = page;
                stub.source_position = position as u32 + 1;
                stub
            })
            .collect();

        info!("Page {}: {} listings", page, stubs.len());

        if stubs.is_empty() {
            return Step::CheckTermination(body);
        }

        if page > SPARSE_CHECK_AFTER_PAGE && stubs.len() < SPARSE_PAGE_LISTINGS {
            warn!("Page {} has only {} listings", page, stubs.len());
            if let Some(total) = self.extractor.total_results(&body) {
                let expected_pages = total / RESULTS_PER_PAGE + 1;
                debug!(
                    "Source reports {} results, about {} pages",
                    total, expected_pages
                );
                if page > expected_pages {
                    info!(
                        "Page {} is past the {} pages the result total allows",
                        page, expected_pages
                    );
                    ctx.state.terminate(TerminalReason::ResultsExhausted);
                    return Step::Done;
                }
            }
        }

        if self.settings.fetch_details {
            Step::DetailFetch(stubs)
        } else {
            Step::BufferAndFlush(stubs)
        }
    }

    async fn check_termination(&mut self, ctx: &mut RunContext, body: &str) -> Step {
        let page = ctx.state.current_page;

        let at_limit = self.settings.max_pages > 0 && page >= self.settings.max_pages;

        if !at_limit
            && !self.extractor.page_loaded(body)
            && ctx.state.transient_attempts < self.settings.max_transient_retries
        {
            let attempt = ctx.state.transient_attempts;
            ctx.state.transient_attempts += 1;
            let delay = transient_backoff(
                Duration::from_millis(self.settings.transient_backoff_ms),
                attempt,
            );
            warn!(
                "Page {} did not render (attempt {}/{}), retrying in {:?}",
                page,
                attempt + 1,
                self.settings.max_transient_retries,
                delay
            );
            pause(delay).await;
            return Step::FetchPage;
        }

        let reason = if at_limit {
            Some(TerminalReason::PageLimit)
        } else if self.extractor.has_end_marker(body) {
            Some(TerminalReason::EmptyWithEndMarkers)
        } else if !self.extractor.has_pagination(body) {
            Some(TerminalReason::EmptyNoPagination)
        } else {
            None
        };

        if let Some(reason) = reason {
            info!("Page {} is empty: {}", page, reason);
            ctx.state.terminate(reason);
            return Step::Done;
        }

        if page <= self.settings.empty_page_retry_window
            && ctx.state.empty_retries < self.settings.empty_page_retries
        {
            ctx.state.empty_retries += 1;
            warn!(
                "Page {} came back empty, retrying ({}/{})",
                page, ctx.state.empty_retries, self.settings.empty_page_retries
            );
            pause(Duration::from_millis(self.settings.page_delay_ms)).await;
            return Step::FetchPage;
        }

        info!("Page {} is empty, assuming end of results", page);
        ctx.state.terminate(TerminalReason::EmptyResults);
        Step::Done
    }

    fn buffer_and_flush(&mut self, ctx: &mut RunContext, listings: Vec<ListingRecord>) {
        for listing in listings {
            ctx.collected.push(listing.clone());
            ctx.buffer.push(listing);

            if self.settings.batch_size > 0 && ctx.buffer.len() >= self.settings.batch_size {
                self.flush(ctx);
            }
        }
    }

    /// Deduplicates the buffer and hands it to the batch callback
    ///
    /// The buffer is emptied even when the callback fails.
    fn flush(&mut self, ctx: &mut RunContext) {
        if ctx.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut ctx.buffer);
        let clusters = self.deduplicator.cluster(&batch);
        let mut representatives = Vec::with_capacity(clusters.len());
        let mut duplicates = Vec::new();
        for cluster in clusters {
            representatives.push(cluster.representative);
            duplicates.extend(cluster.merged);
        }

        info!(
            "Flushing batch: {} listings, {} after deduplication",
            batch.len(),
            representatives.len()
        );
        if !duplicates.is_empty() {
            debug!("{}", generate_duplicate_report(&duplicates));
        }

        ctx.batches_flushed += 1;
        let Some(callback) = self.batch_callback.as_mut() else {
            return;
        };

        match callback(&representatives) {
            Ok(saved) => {
                ctx.listings_saved += saved;
                info!("Batch stored: {} new listings", saved);
            }
            Err(e) => {
                ctx.batches_failed += 1;
                warn!(
                    "Batch callback failed, {} listings lost: {}",
                    representatives.len(),
                    e
                );
            }
        }
    }

    async fn advance(&mut self, ctx: &mut RunContext) -> Step {
        let next_page = ctx.state.current_page + 1;
        self.save_checkpoint(next_page);
        ctx.state.advance();

        if !self.page_limit_reached(next_page) {
            let delay = Duration::from_millis(self.settings.page_delay_ms);
            pause(jitter(delay / 2, delay + delay / 2)).await;
        }
        Step::FetchPage
    }
}
