//! Batch deduplication
//!
//! Greedy first-match clustering: each record joins the first representative
//! it scores at or above the threshold against, in insertion order.

use crate::config::DedupConfig;
use crate::dedup::priority::SourcePriority;
use crate::dedup::similarity::SimilarityScorer;
use crate::listing::ListingRecord;
use tracing::debug;

pub const DEFAULT_THRESHOLD: f64 = 75.0;

/// A representative listing and the records merged into it
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCluster {
    pub representative: ListingRecord,
    pub merged: Vec<ListingRecord>,
}

impl DuplicateCluster {
    fn new(representative: ListingRecord) -> Self {
        Self {
            representative,
            merged: Vec::new(),
        }
    }

    /// Number of records in the cluster, representative included
    pub fn size(&self) -> usize {
        1 + self.merged.len()
    }

    pub fn merged_urls(&self) -> Vec<&str> {
        self.merged.iter().map(|l| l.url.as_str()).collect()
    }

    /// Makes `candidate` the representative; the old one becomes a member
    fn promote(&mut self, candidate: ListingRecord) {
        let previous = std::mem::replace(&mut self.representative, candidate);
        self.merged.push(previous);
    }
}

/// Greedy first-match deduplication of one batch
///
/// Records are compared against the current representatives in insertion
/// order and join the first one scoring at or above the threshold. The
/// result depends on input order; with `keep_best_source` the batch is first
/// stable-sorted by source priority.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    scorer: SimilarityScorer,
    priority: SourcePriority,
    threshold: f64,
    keep_best_source: bool,
}

impl Deduplicator {
    pub fn new(threshold: f64, keep_best_source: bool, priority: SourcePriority) -> Self {
        Self {
            scorer: SimilarityScorer::new(),
            priority,
            threshold,
            keep_best_source,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(
            config.threshold,
            config.keep_best_source,
            SourcePriority::new(config.source_priority.clone()),
        )
    }

    /// Replaces the scorer, e.g. to share a normalization cache
    pub fn with_scorer(mut self, scorer: SimilarityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Returns true if two listings are duplicates at `threshold`
    ///
    /// Listings sharing a non-empty URL always match.
    pub fn is_match_at(&self, a: &ListingRecord, b: &ListingRecord, threshold: f64) -> bool {
        if !a.url.is_empty() && a.url == b.url {
            return true;
        }
        self.scorer.score(a, b).meets(threshold)
    }

    pub fn is_match(&self, a: &ListingRecord, b: &ListingRecord) -> bool {
        self.is_match_at(a, b, self.threshold)
    }

    /// Groups a batch into clusters, one per surviving representative
    pub fn cluster(&self, batch: &[ListingRecord]) -> Vec<DuplicateCluster> {
        let mut ordered = batch.to_vec();
        if self.keep_best_source {
            self.priority.sort(&mut ordered);
        }

        let mut clusters: Vec<DuplicateCluster> = Vec::new();

        for listing in ordered {
            let matched = clusters
                .iter()
                .position(|c| self.is_match(&listing, &c.representative));

            match matched {
                Some(index) => {
                    let cluster = &mut clusters[index];
                    if self.keep_best_source
                        && self
                            .priority
                            .outranks(&listing.source, &cluster.representative.source)
                    {
                        debug!(
                            "Promoting {} over {} as representative",
                            listing.url, cluster.representative.url
                        );
                        cluster.promote(listing);
                    } else {
                        debug!(
                            "Merging duplicate {} into {}",
                            listing.url, cluster.representative.url
                        );
                        cluster.merged.push(listing);
                    }
                }
                None => clusters.push(DuplicateCluster::new(listing)),
            }
        }

        clusters
    }

    /// Collapses a batch to its representatives
    pub fn deduplicate(&self, batch: &[ListingRecord]) -> Vec<ListingRecord> {
        self.cluster(batch)
            .into_iter()
            .map(|c| c.representative)
            .collect()
    }

    /// Splits a batch into unique listings and the duplicates they absorbed
    ///
    /// Input order is kept and no source arbitration happens; the first
    /// occurrence of each group is the unique one.
    pub fn find_duplicates(
        &self,
        batch: &[ListingRecord],
        threshold: f64,
    ) -> (Vec<ListingRecord>, Vec<ListingRecord>) {
        let mut unique: Vec<ListingRecord> = Vec::new();
        let mut duplicates = Vec::new();

        for listing in batch {
            if unique
                .iter()
                .any(|u| self.is_match_at(listing, u, threshold))
            {
                duplicates.push(listing.clone());
            } else {
                unique.push(listing.clone());
            }
        }

        (unique, duplicates)
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, true, SourcePriority::default())
    }
}
