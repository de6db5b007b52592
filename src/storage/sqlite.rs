//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `ListingStore`
//! and `CheckpointStore` traits.

use crate::listing::{ListingRecord, Market};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, ListingFilter, ListingStore, StorageResult};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const INSERT_LISTING_SQL: &str = "
    INSERT OR IGNORE INTO listings (
        url, listing_id, title, price, area, rooms,
        address_raw, street, district, city, province, market,
        has_balcony, has_garage, has_garden, has_elevator, has_basement,
        has_separate_kitchen, has_dishwasher, has_fridge, has_oven,
        year_of_construction, building_type, floor, total_floors,
        finish_standard, heating_type, rent_amount,
        source, source_page, source_position, latitude, longitude, created_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6,
        ?7, ?8, ?9, ?10, ?11, ?12,
        ?13, ?14, ?15, ?16, ?17,
        ?18, ?19, ?20, ?21,
        ?22, ?23, ?24, ?25,
        ?26, ?27, ?28,
        ?29, ?30, ?31, ?32, ?33, ?34
    )";

const SELECT_LISTING_SQL: &str = "
    SELECT url, listing_id, title, price, area, rooms,
           address_raw, street, district, city, province, market,
           has_balcony, has_garage, has_garden, has_elevator, has_basement,
           has_separate_kitchen, has_dishwasher, has_fridge, has_oven,
           year_of_construction, building_type, floor, total_floors,
           finish_standard, heating_type, rent_amount,
           source, source_page, source_position, latitude, longitude
    FROM listings WHERE url = ?1";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    let market: String = row.get(11)?;
    Ok(ListingRecord {
        url: row.get(0)?,
        listing_id: row.get(1)?,
        title: row.get(2)?,
        price: row.get(3)?,
        area: row.get(4)?,
        rooms: row.get(5)?,
        address_raw: row.get(6)?,
        street: row.get(7)?,
        district: row.get(8)?,
        city: row.get(9)?,
        province: row.get(10)?,
        market: Market::from_label(&market).unwrap_or_default(),
        has_balcony: row.get(12)?,
        has_garage: row.get(13)?,
        has_garden: row.get(14)?,
        has_elevator: row.get(15)?,
        has_basement: row.get(16)?,
        has_separate_kitchen: row.get(17)?,
        has_dishwasher: row.get(18)?,
        has_fridge: row.get(19)?,
        has_oven: row.get(20)?,
        year_of_construction: row.get(21)?,
        building_type: row.get(22)?,
        floor: row.get(23)?,
        total_floors: row.get(24)?,
        finish_standard: row.get(25)?,
        heating_type: row.get(26)?,
        rent_amount: row.get(27)?,
        source: row.get(28)?,
        source_page: row.get(29)?,
        source_position: row.get(30)?,
        latitude: row.get(31)?,
        longitude: row.get(32)?,
    })
}

impl ListingStore for SqliteStorage {
    fn save_batch(&mut self, listings: &[ListingRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut saved = 0;

        {
            let mut stmt = tx.prepare(INSERT_LISTING_SQL)?;
            for l in listings {
                saved += stmt.execute(params![
                    l.url,
                    l.listing_id,
                    l.title,
                    l.price,
                    l.area,
                    l.rooms,
                    l.address_raw,
                    l.street,
                    l.district,
                    l.city,
                    l.province,
                    l.market.to_db_string(),
                    l.has_balcony,
                    l.has_garage,
                    l.has_garden,
                    l.has_elevator,
                    l.has_basement,
                    l.has_separate_kitchen,
                    l.has_dishwasher,
                    l.has_fridge,
                    l.has_oven,
                    l.year_of_construction,
                    l.building_type,
                    l.floor,
                    l.total_floors,
                    l.finish_standard,
                    l.heating_type,
                    l.rent_amount,
                    l.source,
                    l.source_page,
                    l.source_position,
                    l.latitude,
                    l.longitude,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(saved)
    }

    fn count_listings(&self, filter: ListingFilter) -> StorageResult<u64> {
        let condition = match filter {
            ListingFilter::All => "1 = 1",
            ListingFilter::WithPrice => "price IS NOT NULL",
            ListingFilter::WithArea => "area IS NOT NULL",
            ListingFilter::Geocoded => "latitude IS NOT NULL AND longitude IS NOT NULL",
            ListingFilter::Market(Market::Primary) => "market = 'primary'",
            ListingFilter::Market(Market::Secondary) => "market = 'secondary'",
            ListingFilter::WithBalcony => "has_balcony = 1",
            ListingFilter::WithGarage => "has_garage = 1",
        };

        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM listings WHERE {}", condition),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_listing(&self, url: &str) -> StorageResult<Option<ListingRecord>> {
        let listing = self
            .conn
            .query_row(SELECT_LISTING_SQL, params![url], row_to_listing)
            .optional()?;
        Ok(listing)
    }
}

impl CheckpointStore for SqliteStorage {
    fn load(&self, source_key: &str) -> StorageResult<Option<u32>> {
        let page = self
            .conn
            .query_row(
                "SELECT page_number FROM checkpoints WHERE source_key = ?1",
                params![source_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(page)
    }

    fn save(&mut self, source_key: &str, page_number: u32) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO checkpoints (source_key, page_number, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_key) DO UPDATE SET page_number = excluded.page_number,
                                                   updated_at = excluded.updated_at",
            params![source_key, page_number, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&mut self, source_key: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM checkpoints WHERE source_key = ?1",
            params![source_key],
        )?;
        Ok(())
    }
}
