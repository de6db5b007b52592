//! Source ranking used to pick which duplicate survives

use crate::config::default_source_priority;
use crate::listing::ListingRecord;

/// Fixed ranking of origin sites, most preferred first
///
/// Sources missing from the list rank after every listed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority {
    order: Vec<String>,
}

impl SourcePriority {
    pub fn new(order: Vec<String>) -> Self {
        Self { order }
    }

    /// Position of `source` in the ranking; lower is better
    pub fn rank(&self, source: &str) -> usize {
        self.order
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.order.len())
    }

    /// Returns true if `candidate` strictly outranks `incumbent`
    pub fn outranks(&self, candidate: &str, incumbent: &str) -> bool {
        self.rank(candidate) < self.rank(incumbent)
    }

    /// Stable sort, preferred sources first
    pub fn sort(&self, listings: &mut [ListingRecord]) {
        listings.sort_by_key(|l| self.rank(&l.source));
    }

    pub fn sources(&self) -> &[String] {
        &self.order
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self::new(default_source_priority())
    }
}
