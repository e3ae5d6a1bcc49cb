//! SQLite-backed property store

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde_json::Value;
use tracing::{debug, info};

use ha_core::model::PropertyRecord;
use ha_core::store::{PropertyStore, StorePredicate, StoreStats};

use crate::DataError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS properties (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    region           TEXT NOT NULL,
    region_name      TEXT NOT NULL,
    district         TEXT NOT NULL,
    project          TEXT NOT NULL,
    room_type        TEXT NOT NULL,
    area             REAL NOT NULL CHECK (area >= 0),
    floor_raw        TEXT NOT NULL,
    floor            INTEGER NOT NULL,
    total_price      INTEGER NOT NULL CHECK (total_price >= 0),
    unit_price       INTEGER NOT NULL CHECK (unit_price >= 0),
    transaction_date TEXT,
    address          TEXT NOT NULL,
    building_type    TEXT NOT NULL,
    has_parking      INTEGER NOT NULL,
    parking_price    INTEGER NOT NULL,
    land_use         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_properties_region           ON properties (region);
CREATE INDEX IF NOT EXISTS idx_properties_district         ON properties (district);
CREATE INDEX IF NOT EXISTS idx_properties_project          ON properties (project);
CREATE INDEX IF NOT EXISTS idx_properties_room_type        ON properties (room_type);
CREATE INDEX IF NOT EXISTS idx_properties_transaction_date ON properties (transaction_date);

CREATE TABLE IF NOT EXISTS metadata (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const RECORD_COLUMNS: &str = "id, region, region_name, district, project, room_type, area, \
     floor_raw, floor, total_price, unit_price, transaction_date, address, building_type, \
     has_parking, parking_price, land_use";

/// Durable, file-backed store with secondary indexes on the filterable
/// fields and a key-value metadata side table.
///
/// A connection is opened per operation (following the platform's SQLite
/// source); SQLite's own locking makes batched writes atomic with respect
/// to concurrent readers.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Create a store handle for the given database path. No I/O happens
    /// until [`PropertyStore::init`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, DataError> {
        Ok(Connection::open(&self.path)?)
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyRecord> {
        let date: Option<String> = row.get(11)?;
        Ok(PropertyRecord {
            id: Some(row.get(0)?),
            region: row.get(1)?,
            region_name: row.get(2)?,
            district: row.get(3)?,
            project: row.get(4)?,
            room_type: row.get(5)?,
            area: row.get(6)?,
            floor_raw: row.get(7)?,
            floor: row.get(8)?,
            total_price: row.get(9)?,
            unit_price: row.get(10)?,
            transaction_date: date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            address: row.get(12)?,
            building_type: row.get(13)?,
            has_parking: row.get(14)?,
            parking_price: row.get(15)?,
            land_use: row.get(16)?,
        })
    }

    fn select(
        &self,
        predicate: &StorePredicate,
        limit: usize,
    ) -> Result<Vec<PropertyRecord>, DataError> {
        let conn = self.open()?;

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM properties");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<&dyn ToSql> = Vec::new();

        if let Some(region) = &predicate.region {
            clauses.push("region = ?");
            args.push(region);
        }
        if let Some(district) = &predicate.district {
            clauses.push("district = ?");
            args.push(district);
        }
        if let Some(project) = &predicate.project {
            clauses.push("project = ?");
            args.push(project);
        }
        if let Some(room_type) = &predicate.room_type {
            clauses.push("room_type = ?");
            args.push(room_type);
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(&args[..], Self::record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl PropertyStore for SqliteStore {
    async fn init(&self) -> anyhow::Result<()> {
        let conn = self
            .open()
            .map_err(|e| DataError::StoreInit(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| DataError::StoreInit(e.to_string()))?;
        info!(path = %self.path.display(), "property store initialized");
        Ok(())
    }

    async fn add_batch(&self, records: &[PropertyRecord]) -> anyhow::Result<usize> {
        if records.is_empty() {
            debug!("empty batch, nothing to write");
            return Ok(0);
        }

        let mut conn = self.open()?;
        let tx = conn.transaction().map_err(DataError::from)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO properties (region, region_name, district, project, room_type, \
                     area, floor_raw, floor, total_price, unit_price, transaction_date, address, \
                     building_type, has_parking, parking_price, land_use) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                )
                .map_err(DataError::from)?;

            for record in records {
                stmt.execute(params![
                    record.region,
                    record.region_name,
                    record.district,
                    record.project,
                    record.room_type,
                    record.area,
                    record.floor_raw,
                    record.floor,
                    record.total_price,
                    record.unit_price,
                    record
                        .transaction_date
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                    record.address,
                    record.building_type,
                    record.has_parking,
                    record.parking_price,
                    record.land_use,
                ])
                .map_err(DataError::from)?;
            }
        }
        // Dropping an uncommitted transaction rolls it back, so a failed
        // insert above leaves the store untouched.
        tx.commit().map_err(DataError::from)?;

        debug!(count = records.len(), "batch committed");
        Ok(records.len())
    }

    async fn get_all(&self, limit: usize) -> anyhow::Result<Vec<PropertyRecord>> {
        Ok(self.select(&StorePredicate::default(), limit)?)
    }

    async fn query(
        &self,
        predicate: &StorePredicate,
        limit: usize,
    ) -> anyhow::Result<Vec<PropertyRecord>> {
        Ok(self.select(predicate, limit)?)
    }

    async fn count(&self) -> anyhow::Result<StoreStats> {
        let conn = self.open()?;
        let (total, distinct_regions): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT region) FROM properties",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(DataError::from)?;
        Ok(StoreStats {
            total: total as usize,
            distinct_regions: distinct_regions as usize,
        })
    }

    async fn clear_all(&self) -> anyhow::Result<()> {
        let conn = self.open()?;
        let deleted = conn
            .execute("DELETE FROM properties", [])
            .map_err(DataError::from)?;
        info!(deleted, "store cleared");
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(DataError::from)?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text).map_err(DataError::from)?)),
            None => Ok(None),
        }
    }

    async fn set_metadata(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![
                key,
                serde_json::to_string(&value).map_err(DataError::from)?,
                chrono::Utc::now().timestamp()
            ],
        )
        .map_err(DataError::from)?;
        debug!(%key, "metadata written");
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        // Connections are per-operation; nothing is held open.
        debug!(path = %self.path.display(), "store closed");
        Ok(())
    }
}
