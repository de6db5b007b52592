//! Statistics generation from the listings database
//!
//! This module provides functionality for extracting and displaying
//! listing statistics from the storage layer.

use crate::listing::Market;
use crate::storage::{ListingFilter, ListingStore, StorageResult};

/// Listing statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingStatistics {
    /// Total number of stored listings
    pub total_listings: u64,

    pub with_price: u64,
    pub with_area: u64,

    /// Listings with both latitude and longitude
    pub geocoded: u64,

    pub primary_market: u64,
    pub secondary_market: u64,
    pub with_balcony: u64,
    pub with_garage: u64,
}

impl ListingStatistics {
    /// Share of `count` in the total, in percent
    pub fn percentage(&self, count: u64) -> f64 {
        if self.total_listings > 0 {
            (count as f64 / self.total_listings as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ListingStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn ListingStore) -> StorageResult<ListingStatistics> {
    Ok(ListingStatistics {
        total_listings: storage.count_listings(ListingFilter::All)?,
        with_price: storage.count_listings(ListingFilter::WithPrice)?,
        with_area: storage.count_listings(ListingFilter::WithArea)?,
        geocoded: storage.count_listings(ListingFilter::Geocoded)?,
        primary_market: storage.count_listings(ListingFilter::Market(Market::Primary))?,
        secondary_market: storage.count_listings(ListingFilter::Market(Market::Secondary))?,
        with_balcony: storage.count_listings(ListingFilter::WithBalcony)?,
        with_garage: storage.count_listings(ListingFilter::WithGarage)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ListingStatistics) {
    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total_listings);
    println!();

    println!("Coverage:");
    for (label, count) in [
        ("With price", stats.with_price),
        ("With area", stats.with_area),
        ("Geocoded", stats.geocoded),
    ] {
        println!("  {}: {} ({:.1}%)", label, count, stats.percentage(count));
    }
    println!();

    println!("Market:");
    println!(
        "  Primary: {} ({:.1}%)",
        stats.primary_market,
        stats.percentage(stats.primary_market)
    );
    println!(
        "  Secondary: {} ({:.1}%)",
        stats.secondary_market,
        stats.percentage(stats.secondary_market)
    );
    println!();

    println!("Amenities:");
    println!(
        "  Balcony: {} ({:.1}%)",
        stats.with_balcony,
        stats.percentage(stats.with_balcony)
    );
    println!(
        "  Garage: {} ({:.1}%)",
        stats.with_garage,
        stats.percentage(stats.with_garage)
    );
}
