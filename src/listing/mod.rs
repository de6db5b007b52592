//! Listing data model
//!
//! - `ListingRecord`: one scraped property advertisement
//! - `Market`: primary vs. secondary market
//! - `DetailFields`: the partial field map returned by a detail-page parse

mod detail;
mod record;

pub use detail::DetailFields;
pub use record::{ListingRecord, Market};
