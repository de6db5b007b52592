//! Duplicate report
//!
//! Summarizes the records a batch flush discarded as duplicates, grouped by
//! source in the order sources first appear.

use crate::listing::ListingRecord;
use std::fmt::Write;

/// Examples shown per source
const MAX_EXAMPLES: usize = 3;

/// Characters of the title shown per example
const TITLE_WIDTH: usize = 50;

/// Groups listings by source, keeping first-seen order
fn group_by_source(duplicates: &[ListingRecord]) -> Vec<(&str, Vec<&ListingRecord>)> {
    let mut groups: Vec<(&str, Vec<&ListingRecord>)> = Vec::new();
    for listing in duplicates {
        let source = if listing.source.is_empty() {
            "unknown"
        } else {
            listing.source.as_str()
        };
        match groups.iter_mut().find(|(s, _)| *s == source) {
            Some((_, group)) => group.push(listing),
            None => groups.push((source, vec![listing])),
        }
    }
    groups
}

fn truncate_title(title: &str) -> String {
    if title.is_empty() {
        return "(no title)".to_string();
    }
    title.chars().take(TITLE_WIDTH).collect()
}

/// Generates a plain-text report of discarded duplicates
///
/// # Example
///
/// ```
/// use listing_harvester::output::generate_duplicate_report;
///
/// assert_eq!(generate_duplicate_report(&[]), "No duplicates found.");
/// ```
pub fn generate_duplicate_report(duplicates: &[ListingRecord]) -> String {
    if duplicates.is_empty() {
        return "No duplicates found.".to_string();
    }

    let mut report = String::from("Duplicate report:\n");
    report.push_str(&"-".repeat(20));
    report.push('\n');

    for (source, group) in group_by_source(duplicates) {
        let _ = writeln!(report, "* {}: {} duplicates", source, group.len());
        for listing in group.iter().take(MAX_EXAMPLES) {
            let _ = writeln!(
                report,
                "  - {}... (URL: {})",
                truncate_title(&listing.title),
                listing.url
            );
        }
        if group.len() > MAX_EXAMPLES {
            let _ = writeln!(
                report,
                "  ...and {} more from {}",
                group.len() - MAX_EXAMPLES,
                source
            );
        }
    }

    report
}
