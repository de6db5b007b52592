//! Weighted multi-field similarity between two listings
//!
//! A field only takes part in the score when both records carry a usable
//! value for it, so sparse records are compared on fewer fields rather than
//! being penalized for missing data.

use crate::dedup::normalize::NormalizationCache;
use crate::listing::ListingRecord;
use std::fmt;
use std::sync::Arc;

pub const TITLE_WEIGHT: f64 = 0.40;
pub const PRICE_WEIGHT: f64 = 0.25;
pub const AREA_WEIGHT: f64 = 0.15;
pub const ROOMS_WEIGHT: f64 = 0.10;
pub const LOCATION_WEIGHT: f64 = 0.10;

/// Relative price difference scored as a full match
const PRICE_MATCH_BAND: f64 = 0.05;
/// Relative area difference scored as a full match
const AREA_MATCH_BAND: f64 = 0.10;
/// Relative differences beyond this are scored as if they were this
const MAX_DECAY: f64 = 0.5;

const CITY_RATIO_MIN: f64 = 80.0;
const DISTRICT_RATIO_MIN: f64 = 70.0;

/// Field compared by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimilarityField {
    Title,
    Price,
    Area,
    Rooms,
    Location,
}

impl SimilarityField {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Title => TITLE_WEIGHT,
            Self::Price => PRICE_WEIGHT,
            Self::Area => AREA_WEIGHT,
            Self::Rooms => ROOMS_WEIGHT,
            Self::Location => LOCATION_WEIGHT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Area => "area",
            Self::Rooms => "rooms",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for SimilarityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score of one comparable field, before weighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldContribution {
    pub field: SimilarityField,
    /// 0.0 to 100.0
    pub score: f64,
}

impl FieldContribution {
    pub fn weighted(&self) -> f64 {
        self.score * self.field.weight()
    }
}

/// Composite similarity of two listings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimilarityScore {
    /// 0.0 to 100.0; 0.0 when no field was comparable
    pub value: f64,
    pub contributions: Vec<FieldContribution>,
}

impl SimilarityScore {
    fn from_contributions(contributions: Vec<FieldContribution>) -> Self {
        let total_weight: f64 = contributions.iter().map(|c| c.field.weight()).sum();
        let value = if total_weight > 0.0 {
            contributions.iter().map(FieldContribution::weighted).sum::<f64>() / total_weight
        } else {
            0.0
        };
        Self {
            value,
            contributions,
        }
    }

    /// Sum of the weights of the fields that were compared
    pub fn total_weight(&self) -> f64 {
        self.contributions.iter().map(|c| c.field.weight()).sum()
    }

    pub fn contribution(&self, field: SimilarityField) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.score)
    }

    /// Returns false for NaN scores
    pub fn meets(&self, threshold: f64) -> bool {
        self.value >= threshold
    }
}

/// Indel similarity of two strings on a 0-100 integer scale
///
/// `(len_a + len_b - indel_distance) / (len_a + len_b)`, so words added to
/// one side cost less than under a max-length edit distance. Exact halves
/// round to even. Empty input scores 0.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0).round_ties_even()
}

/// Scores a relative numeric difference: full marks inside `band`, linear
/// decay outside it, floored at 50
fn banded_score(a: f64, b: f64, band: f64) -> Option<f64> {
    if !(a.is_finite() && b.is_finite()) || a <= 0.0 || b <= 0.0 {
        return None;
    }
    let diff = (a - b).abs() / a.max(b);
    if diff <= band {
        Some(100.0)
    } else {
        Some((1.0 - diff.min(MAX_DECAY)).max(0.0) * 100.0)
    }
}

/// Computes listing similarity through a shared normalization cache
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    cache: Arc<NormalizationCache>,
}

impl SimilarityScorer {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(NormalizationCache::new()))
    }

    pub fn with_cache(cache: Arc<NormalizationCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &NormalizationCache {
        &self.cache
    }

    /// Full score with per-field contributions
    pub fn score(&self, a: &ListingRecord, b: &ListingRecord) -> SimilarityScore {
        let contributions = [
            self.title_score(a, b),
            banded_score_opt(a.price, b.price, PRICE_MATCH_BAND).map(|s| (SimilarityField::Price, s)),
            banded_score_opt(a.area, b.area, AREA_MATCH_BAND).map(|s| (SimilarityField::Area, s)),
            rooms_score(a, b),
            self.location_score(a, b),
        ]
        .into_iter()
        .flatten()
        .map(|(field, score)| FieldContribution { field, score })
        .collect();

        SimilarityScore::from_contributions(contributions)
    }

    /// Composite value only
    pub fn similarity(&self, a: &ListingRecord, b: &ListingRecord) -> f64 {
        self.score(a, b).value
    }

    fn title_score(&self, a: &ListingRecord, b: &ListingRecord) -> Option<(SimilarityField, f64)> {
        let left = self.cache.normalize_text(&a.title);
        let right = self.cache.normalize_text(&b.title);
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some((SimilarityField::Title, fuzzy_ratio(&left, &right)))
    }

    /// Half credit for a matching city, the other half only if the district
    /// matches as well
    fn location_score(&self, a: &ListingRecord, b: &ListingRecord) -> Option<(SimilarityField, f64)> {
        let city_a = self.normalized(a.city.as_deref());
        let city_b = self.normalized(b.city.as_deref());
        if city_a.is_empty() || city_b.is_empty() {
            return None;
        }

        let mut score = 0.0;
        if fuzzy_ratio(&city_a, &city_b) > CITY_RATIO_MIN {
            score += 50.0;

            let district_a = self.normalized(a.district.as_deref());
            let district_b = self.normalized(b.district.as_deref());
            if !district_a.is_empty()
                && !district_b.is_empty()
                && fuzzy_ratio(&district_a, &district_b) > DISTRICT_RATIO_MIN
            {
                score += 50.0;
            }
        }

        Some((SimilarityField::Location, score))
    }

    fn normalized(&self, value: Option<&str>) -> String {
        value
            .map(|v| self.cache.normalize_text(v))
            .unwrap_or_default()
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn banded_score_opt(a: Option<f64>, b: Option<f64>, band: f64) -> Option<f64> {
    banded_score(a?, b?, band)
}

fn rooms_score(a: &ListingRecord, b: &ListingRecord) -> Option<(SimilarityField, f64)> {
    let (left, right) = (a.rooms?, b.rooms?);
    let score = if left == right { 100.0 } else { 0.0 };
    Some((SimilarityField::Rooms, score))
}
