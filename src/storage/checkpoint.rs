//! File-backed and in-memory checkpoint stores
//!
//! The JSON file holds a single object mapping each crawl base URL to the
//! page the next run should start at, e.g. `{"https://...": 7}`.

use crate::storage::traits::{CheckpointStore, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Checkpoints persisted as a JSON object in a single file
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole file; a missing or unreadable file is an empty map
    fn read_all(&self) -> HashMap<String, u32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    "Ignoring unreadable checkpoint file {}: {}",
                    self.path.display(),
                    e
                );
                HashMap::new()
            }
        }
    }

    fn write_all(&self, map: &HashMap<String, u32>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self, source_key: &str) -> StorageResult<Option<u32>> {
        Ok(self.read_all().get(source_key).copied())
    }

    fn save(&mut self, source_key: &str, page_number: u32) -> StorageResult<()> {
        let mut map = self.read_all();
        map.insert(source_key.to_string(), page_number);
        self.write_all(&map)
    }

    fn clear(&mut self, source_key: &str) -> StorageResult<()> {
        let mut map = self.read_all();
        if map.remove(source_key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

/// Checkpoints kept only for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    entries: HashMap<String, u32>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, source_key: &str) -> StorageResult<Option<u32>> {
        Ok(self.entries.get(source_key).copied())
    }

    fn save(&mut self, source_key: &str, page_number: u32) -> StorageResult<()> {
        self.entries.insert(source_key.to_string(), page_number);
        Ok(())
    }

    fn clear(&mut self, source_key: &str) -> StorageResult<()> {
        self.entries.remove(source_key);
        Ok(())
    }
}
