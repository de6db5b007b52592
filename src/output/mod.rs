//! Output module for crawl reports
//!
//! This module handles:
//! - Statistics over the stored listings
//! - Reports of the duplicates discarded by a batch flush

mod report;
pub mod stats;

pub use report::generate_duplicate_report;
pub use stats::{load_statistics, print_statistics, ListingStatistics};
