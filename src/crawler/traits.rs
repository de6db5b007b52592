//! Collaborator interfaces consumed by the crawl controller
//!
//! The controller and the detail fetch pool only talk to the network, the
//! page markup and the geocoder through these traits, so each can be swapped
//! for a scripted implementation in tests.

use crate::listing::{DetailFields, ListingRecord};
use crate::FetchError;
use async_trait::async_trait;

/// Downloads raw page content
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, failing with a classified error
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Turns page markup into listing data
///
/// "No data found" is never an error: the list-page methods return empty
/// results and `extract_details` returns empty `DetailFields`.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Parses the listing stubs of one results page
    fn extract_stubs(&self, page: &str) -> Vec<ListingRecord>;

    /// Returns true if the page says the result set has ended
    fn has_end_marker(&self, page: &str) -> bool;

    /// Returns true if the page carries pagination navigation
    fn has_pagination(&self, page: &str) -> bool;

    /// Total number of results the page advertises, if it says
    fn total_results(&self, _page: &str) -> Option<u32> {
        None
    }

    /// Returns false if the body is not a rendered page of the source at all
    fn page_loaded(&self, _page: &str) -> bool {
        true
    }

    /// Fetches and parses the detail page of one listing
    async fn extract_details(&self, url: &str) -> Result<DetailFields, FetchError>;
}

/// Resolves a free-text address to coordinates
#[async_trait]
pub trait CoordinateResolver: Send + Sync {
    /// Returns `(latitude, longitude)`, or `None` if nothing usable was found
    async fn resolve(&self, query: &str) -> Option<(f64, f64)>;
}

/// Structured parts of a raw address string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressParts {
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
}

impl AddressParts {
    /// Copies the parts onto a listing
    pub fn apply_to(self, listing: &mut ListingRecord) {
        listing.street = self.street;
        listing.district = self.district;
        listing.city = self.city;
        listing.province = self.province;
    }
}

/// Splits a raw address into street, district, city and province
pub trait AddressDecomposer: Send + Sync {
    fn decompose(&self, address_raw: &str) -> AddressParts;
}
