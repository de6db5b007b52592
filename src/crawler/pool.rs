//! Detail fetch pool
//!
//! Enriches the stubs of one results page concurrently. Each stub gets its
//! own task, at most `max_workers` run at once, and every task is bounded by
//! a timeout. A task that fails or times out contributes the untouched stub,
//! so the output always has as many records as the input.

use crate::config::{CrawlerConfig, GeocodingConfig};
use crate::crawler::traits::{CoordinateResolver, Extractor};
use crate::geocoding::{build_geocoding_query, is_trivial_query};
use crate::listing::ListingRecord;
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Completed tasks between progress log lines
const PROGRESS_INTERVAL: usize = 5;

/// Timing knobs of the pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub task_timeout: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// Pause after each coordinate lookup
    pub enrichment_delay: Duration,
    /// Country appended to geocoding queries
    pub country: String,
}

impl PoolSettings {
    pub fn from_config(crawler: &CrawlerConfig, geocoding: &GeocodingConfig) -> Self {
        Self {
            task_timeout: Duration::from_secs(crawler.task_timeout_secs),
            jitter_min: Duration::from_millis(crawler.detail_jitter_min_ms),
            jitter_max: Duration::from_millis(crawler.detail_jitter_max_ms),
            enrichment_delay: Duration::from_millis(crawler.enrichment_delay_ms),
            country: geocoding.country.clone(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(60),
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(2000),
            enrichment_delay: Duration::from_secs(1),
            country: "Polska".to_string(),
        }
    }
}

/// Random delay in `[min, max]`
pub(crate) fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}

#[derive(Debug)]
struct Progress {
    completed: usize,
    total: usize,
}

impl Progress {
    fn tick(progress: &Mutex<Progress>) {
        let mut guard = progress.lock().unwrap_or_else(PoisonError::into_inner);
        guard.completed += 1;
        if guard.completed % PROGRESS_INTERVAL == 0 || guard.completed == guard.total {
            info!("Detail progress: {}/{}", guard.completed, guard.total);
        }
    }
}

/// Bounded-concurrency enrichment of listing stubs
#[derive(Clone)]
pub struct DetailFetchPool {
    extractor: Arc<dyn Extractor>,
    resolver: Option<Arc<dyn CoordinateResolver>>,
    settings: Arc<PoolSettings>,
}

impl DetailFetchPool {
    pub fn new(extractor: Arc<dyn Extractor>, settings: PoolSettings) -> Self {
        Self {
            extractor,
            resolver: None,
            settings: Arc::new(settings),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CoordinateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Enriches `stubs` with detail fields and, when enabled, coordinates
    ///
    /// Records come back in completion order, not input order.
    pub async fn enrich(
        &self,
        stubs: Vec<ListingRecord>,
        enable_enrichment: bool,
        max_workers: usize,
    ) -> Vec<ListingRecord> {
        let total = stubs.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let progress = Arc::new(Mutex::new(Progress {
            completed: 0,
            total,
        }));
        let mut tasks = JoinSet::new();

        for (index, stub) in stubs.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);
            let pool = self.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let url = stub.url.clone();
                let outcome = tokio::time::timeout(
                    pool.settings.task_timeout,
                    pool.enrich_one(stub, enable_enrichment),
                )
                .await;
                Progress::tick(&progress);

                match outcome {
                    Ok(record) => (index, record),
                    Err(_) => {
                        warn!(
                            "Detail task for {} timed out after {:?}",
                            url, pool.settings.task_timeout
                        );
                        (index, None)
                    }
                }
            });
        }

        let mut resolved = vec![false; total];
        let mut output = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(record))) => {
                    resolved[index] = true;
                    output.push(record);
                }
                Ok((index, None)) => {
                    resolved[index] = true;
                    output.push(stubs[index].clone());
                }
                Err(e) => warn!("Detail task failed: {}", e),
            }
        }

        // Panicked tasks lose their index; their stubs go in unenriched
        for (index, done) in resolved.iter().enumerate() {
            if !done {
                output.push(stubs[index].clone());
            }
        }

        output
    }

    /// Returns `None` if the detail fetch failed
    async fn enrich_one(
        &self,
        mut listing: ListingRecord,
        enable_enrichment: bool,
    ) -> Option<ListingRecord> {
        tokio::time::sleep(jitter(self.settings.jitter_min, self.settings.jitter_max)).await;

        match self.extractor.extract_details(&listing.url).await {
            Ok(fields) => fields.merge_into(&mut listing),
            Err(e) => {
                warn!("Detail fetch failed for {}: {}", listing.url, e);
                return None;
            }
        }

        if enable_enrichment {
            if let Some(resolver) = &self.resolver {
                let query = build_geocoding_query(&listing, &self.settings.country);
                if !is_trivial_query(&query, &self.settings.country) {
                    match resolver.resolve(&query).await {
                        Some((lat, lon)) => listing.set_coordinates(lat, lon),
                        None => debug!("No coordinates for '{}'", query),
                    }
                    tokio::time::sleep(self.settings.enrichment_delay).await;
                }
            }
        }

        Some(listing)
    }
}
