//! Listing Harvester: a resumable real-estate listing crawler
//!
//! This crate walks a paginated listing source page by page, enriches each
//! listing with detail-page data and coordinates, collapses near-duplicate
//! listings within each batch, and hands clean batches to a store.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod geocoding;
pub mod listing;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Page fetch failures, classified by how the crawl controller reacts to them
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection, TLS or 5xx failure; the same page is retried
    #[error("Transient fetch failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// Anti-automation response (403, captcha); the crawl is aborted
    #[error("Blocked while fetching {url}: {message}")]
    Blocked { url: String, message: String },

    /// Anything else; the page is skipped and counted toward the error threshold
    #[error("Fetch failed for {url}: {message}")]
    Other { url: String, message: String },
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "ssl",
    "tls",
    "502",
    "503",
    "504",
];

const BLOCK_MARKERS: &[&str] = &["403", "forbidden", "blocked", "captcha", "bot detect"];

impl FetchError {
    /// Classifies a free-text failure message
    ///
    /// Transient markers are checked before block markers, so a
    /// "connection blocked by firewall timeout" counts as transient.
    pub fn classify_message(url: &str, message: &str) -> Self {
        let lowered = message.to_lowercase();
        let url = url.to_string();
        let message = message.to_string();

        if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            FetchError::Transient { url, message }
        } else if BLOCK_MARKERS.iter().any(|m| lowered.contains(m)) {
            FetchError::Blocked { url, message }
        } else {
            FetchError::Other { url, message }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Blocked { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Transient { url, .. }
            | FetchError::Blocked { url, .. }
            | FetchError::Other { url, .. } => url,
        }
    }
}

/// Result type alias for Listing Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlController, CrawlOutcome};
pub use dedup::{Deduplicator, SimilarityScorer};
pub use listing::{DetailFields, ListingRecord, Market};
pub use state::{CrawlState, TerminalReason};
