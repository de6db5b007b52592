//! Deduplication of listing batches
//!
//! # Components
//!
//! - `normalize`: text and number canonicalization, memoized by `NormalizationCache`
//! - `similarity`: weighted 0-100 similarity of two listings
//! - `priority`: source ranking used to pick representatives
//! - `engine`: greedy first-match clustering of a batch

mod engine;
mod normalize;
mod priority;
mod similarity;

pub use engine::{Deduplicator, DuplicateCluster, DEFAULT_THRESHOLD};
pub use normalize::{
    extract_area_number, extract_rooms_number, normalize_text, NormalizationCache,
};
pub use priority::SourcePriority;
pub use similarity::{
    fuzzy_ratio, FieldContribution, SimilarityField, SimilarityScore, SimilarityScorer,
};
