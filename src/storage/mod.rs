//! Storage module for persisting harvested data
//!
//! This module handles:
//! - SQLite database initialization and schema management
//! - Idempotent listing persistence keyed by url
//! - Crawl checkpoints, in the database or in a JSON file

mod checkpoint;
mod schema;
mod sqlite;
mod traits;

pub use checkpoint::{JsonCheckpointStore, MemoryCheckpointStore};
pub use sqlite::SqliteStorage;
pub use traits::{CheckpointStore, ListingFilter, ListingStore, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}
