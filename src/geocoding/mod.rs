//! Coordinate enrichment
//!
//! Builds search queries from a listing's address fields and resolves them
//! through a Nominatim-compatible service.

mod nominatim;

pub use nominatim::NominatimResolver;

use crate::crawler::STREET_PREFIXES;
use crate::listing::ListingRecord;

/// Removes a leading "ul. ", "al. ", "pl. " or "os. " (either case)
fn strip_street_prefix(street: &str) -> &str {
    let trimmed = street.trim();
    for prefix in STREET_PREFIXES {
        if trimmed.len() > prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return trimmed[prefix.len()..].trim_start();
        }
    }
    trimmed
}

/// Builds the geocoding query for a listing
///
/// The query is `street, city, country` with street prefixes removed and
/// missing parts left out. Districts are not included; the service resolves
/// them poorly.
pub fn build_geocoding_query(listing: &ListingRecord, country: &str) -> String {
    let mut components = Vec::new();

    if let Some(street) = listing.street.as_deref() {
        let street = strip_street_prefix(street);
        if !street.is_empty() {
            components.push(street);
        }
    }

    if let Some(city) = listing.city.as_deref() {
        let city = city.trim();
        if !city.is_empty() {
            components.push(city);
        }
    }

    components.push(country);
    components.join(", ")
}

/// Returns true if the query carries nothing beyond the country
pub fn is_trivial_query(query: &str, country: &str) -> bool {
    let query = query.trim();
    query.is_empty() || query.eq_ignore_ascii_case(country.trim())
}
