//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Listing Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per unique listing url
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    listing_id TEXT,
    title TEXT NOT NULL,
    price REAL,
    area REAL,
    rooms INTEGER,
    address_raw TEXT NOT NULL,
    street TEXT,
    district TEXT,
    city TEXT,
    province TEXT,
    market TEXT NOT NULL,
    has_balcony INTEGER NOT NULL DEFAULT 0,
    has_garage INTEGER NOT NULL DEFAULT 0,
    has_garden INTEGER NOT NULL DEFAULT 0,
    has_elevator INTEGER NOT NULL DEFAULT 0,
    has_basement INTEGER NOT NULL DEFAULT 0,
    has_separate_kitchen INTEGER NOT NULL DEFAULT 0,
    has_dishwasher INTEGER NOT NULL DEFAULT 0,
    has_fridge INTEGER NOT NULL DEFAULT 0,
    has_oven INTEGER NOT NULL DEFAULT 0,
    year_of_construction INTEGER,
    building_type TEXT,
    floor INTEGER,
    total_floors INTEGER,
    finish_standard INTEGER,
    heating_type TEXT,
    rent_amount REAL,
    source TEXT NOT NULL,
    source_page INTEGER NOT NULL,
    source_position INTEGER NOT NULL,
    latitude REAL,
    longitude REAL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_source ON listings(source);
CREATE INDEX IF NOT EXISTS idx_listings_city ON listings(city);

-- Resume-from page per crawl target
CREATE TABLE IF NOT EXISTS checkpoints (
    source_key TEXT PRIMARY KEY,
    page_number INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
