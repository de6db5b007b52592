//! Crawler module for listing acquisition
//!
//! This module contains the core crawling logic, including:
//! - Collaborator traits for fetching, extraction and geocoding
//! - HTTP fetching with failure classification
//! - HTML extraction of listing stubs and detail pages
//! - Bounded-concurrency detail enrichment
//! - The page-by-page crawl controller

mod address;
mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod traits;

pub use address::{CommaAddressDecomposer, STREET_PREFIXES};
pub use coordinator::{page_url, BatchCallback, CrawlController, CrawlOutcome};
pub use fetcher::{build_http_client, classify_reqwest_error, classify_status, ReqwestPageFetcher};
pub use parser::{parse_amount, parse_detail_page, parse_floor, HtmlExtractor};
pub use pool::{DetailFetchPool, PoolSettings};
pub use traits::{AddressDecomposer, AddressParts, CoordinateResolver, Extractor, PageFetcher};
