//! Text and number normalization for listing comparison
//!
//! The free functions are pure. `NormalizationCache` memoizes them by input
//! string so repeated comparisons inside one batch stay cheap.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Filler words that carry no identity in property titles
const STOP_WORDS: &[&str] = &[
    "mieszkanie",
    "pokojowe",
    "pokój",
    "pokoje",
    "m2",
    "sprzedam",
    "na",
    "sprzedaż",
    "do",
    "w",
    "z",
    "i",
    "a",
    "o",
    "u",
    "po",
];

/// Default number of entries per memo table before it is reset
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

static AREA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*m[2²]?").expect("area pattern is valid"));

static ROOMS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)[\s\-]?pok").expect("rooms pattern is valid"));

/// Canonical form of a free-text field
///
/// Lowercases, replaces punctuation with spaces, drops stop words and every
/// token of two characters or fewer, and joins the rest with single spaces.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");

    stripped
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word) && word.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First number followed by an m² marker, e.g. "65,5 m2" -> 65.5
pub fn extract_area_number(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    let captures = AREA_PATTERN.captures(&lowered)?;
    let number = captures.get(1)?.as_str().replace(',', ".");
    number.parse::<f64>().ok()
}

/// Room count from "3 pokoje", "3-pokojowe", "3pok" or a bare "3"
pub fn extract_rooms_number(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    if let Some(captures) = ROOMS_PATTERN.captures(&lowered) {
        if let Some(Ok(rooms)) = captures.get(1).map(|m| m.as_str().parse::<u32>()) {
            return Some(rooms);
        }
    }

    let trimmed = text.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    None
}

/// Memo tables for the normalization primitives
///
/// Each table is cleared when it reaches capacity, which keeps memory bounded
/// over a long crawl without tracking recency.
#[derive(Debug)]
pub struct NormalizationCache {
    capacity: usize,
    text: Mutex<HashMap<String, String>>,
    area: Mutex<HashMap<String, Option<f64>>>,
    rooms: Mutex<HashMap<String, Option<u32>>>,
}

impl NormalizationCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            text: Mutex::new(HashMap::new()),
            area: Mutex::new(HashMap::new()),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Memoized [`normalize_text`]
    pub fn normalize_text(&self, text: &str) -> String {
        memoize(&self.text, self.capacity, text, normalize_text)
    }

    /// Memoized [`extract_area_number`]
    pub fn area_number(&self, text: &str) -> Option<f64> {
        memoize(&self.area, self.capacity, text, extract_area_number)
    }

    /// Memoized [`extract_rooms_number`]
    pub fn rooms_number(&self, text: &str) -> Option<u32> {
        memoize(&self.rooms, self.capacity, text, extract_rooms_number)
    }

    /// Total number of memoized entries across all tables
    pub fn len(&self) -> usize {
        lock(&self.text).len() + lock(&self.area).len() + lock(&self.rooms).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.text).clear();
        lock(&self.area).clear();
        lock(&self.rooms).clear();
    }
}

impl Default for NormalizationCache {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn memoize<V: Clone>(
    table: &Mutex<HashMap<String, V>>,
    capacity: usize,
    key: &str,
    compute: impl FnOnce(&str) -> V,
) -> V {
    let mut map = lock(table);
    if let Some(value) = map.get(key) {
        return value.clone();
    }

    let value = compute(key);
    if map.len() >= capacity {
        map.clear();
    }
    map.insert(key.to_string(), value.clone());
    value
}
