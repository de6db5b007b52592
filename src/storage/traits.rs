//! Storage traits and error types
//!
//! This module defines the trait interfaces for the listing store and the
//! checkpoint store, and the associated error types.

use crate::listing::{ListingRecord, Market};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Subsets of stored listings that can be counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFilter {
    All,
    WithPrice,
    WithArea,
    Geocoded,
    Market(Market),
    WithBalcony,
    WithGarage,
}

/// Persistence for listing batches
///
/// `save_batch` must be idempotent on `url`: a listing whose url is already
/// stored is skipped, not reported as an error.
pub trait ListingStore: Send {
    /// Stores a batch of listings
    ///
    /// # Returns
    ///
    /// The number of listings that were newly stored
    fn save_batch(&mut self, listings: &[ListingRecord]) -> StorageResult<usize>;

    /// Counts the stored listings matching `filter`
    fn count_listings(&self, filter: ListingFilter) -> StorageResult<u64>;

    /// Looks up a stored listing by url
    fn get_listing(&self, url: &str) -> StorageResult<Option<ListingRecord>>;
}

/// Persistence for the resume-from page of each crawl target
///
/// Keys are crawl base URLs. Only the next page number survives a restart.
pub trait CheckpointStore: Send {
    fn load(&self, source_key: &str) -> StorageResult<Option<u32>>;

    fn save(&mut self, source_key: &str, page_number: u32) -> StorageResult<()>;

    fn clear(&mut self, source_key: &str) -> StorageResult<()>;
}

impl<S: CheckpointStore> CheckpointStore for Arc<Mutex<S>> {
    fn load(&self, source_key: &str) -> StorageResult<Option<u32>> {
        self.lock()
            .map_err(|_| StorageError::Database("checkpoint store lock poisoned".to_string()))?
            .load(source_key)
    }

    fn save(&mut self, source_key: &str, page_number: u32) -> StorageResult<()> {
        self.lock()
            .map_err(|_| StorageError::Database("checkpoint store lock poisoned".to_string()))?
            .save(source_key, page_number)
    }

    fn clear(&mut self, source_key: &str) -> StorageResult<()> {
        self.lock()
            .map_err(|_| StorageError::Database("checkpoint store lock poisoned".to_string()))?
            .clear(source_key)
    }
}

impl<S: ListingStore> ListingStore for Arc<Mutex<S>> {
    fn save_batch(&mut self, listings: &[ListingRecord]) -> StorageResult<usize> {
        self.lock()
            .map_err(|_| StorageError::Database("listing store lock poisoned".to_string()))?
            .save_batch(listings)
    }

    fn count_listings(&self, filter: ListingFilter) -> StorageResult<u64> {
        self.lock()
            .map_err(|_| StorageError::Database("listing store lock poisoned".to_string()))?
            .count_listings(filter)
    }

    fn get_listing(&self, url: &str) -> StorageResult<Option<ListingRecord>> {
        self.lock()
            .map_err(|_| StorageError::Database("listing store lock poisoned".to_string()))?
            .get_listing(url)
    }
}
