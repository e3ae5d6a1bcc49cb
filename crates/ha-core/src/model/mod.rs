//! Domain model for normalized real-estate transactions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A geographic region whose transactions ship as one shard file.
///
/// The code is the shard key (e.g. `taipei`); the name is the display
/// form carried on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

/// One normalized transaction record.
///
/// Created once by the normalizer and immutable thereafter; corrections
/// require clearing and re-ingesting the whole region. Price fields are
/// integers in the base currency unit (NTD); source files carry them in
/// units of 10,000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Store-assigned key, `None` until the record has been persisted.
    pub id: Option<i64>,
    /// Region code, e.g. `taipei`.
    pub region: String,
    /// Region display name.
    pub region_name: String,
    pub district: String,
    /// Project (development) name.
    pub project: String,
    /// Canonical room-type tag: `"{n} room(s)"` or `"unknown"`.
    pub room_type: String,
    /// Floor area in ping; 0.0 when the source carried no usable value.
    pub area: f64,
    /// Raw floor field as shipped.
    pub floor_raw: String,
    /// Parsed floor: positive number, -1 whole building, -2 basement,
    /// 0 unparseable.
    pub floor: i32,
    /// Total price in NTD; 0 when missing, strictly positive otherwise.
    pub total_price: i64,
    /// Unit price in NTD per ping; 0 when missing.
    pub unit_price: i64,
    /// Fully valid calendar date or `None`, never partially parsed.
    pub transaction_date: Option<NaiveDate>,
    pub address: String,
    pub building_type: String,
    pub has_parking: bool,
    /// Parking price in NTD; 0 when missing.
    pub parking_price: i64,
    pub land_use: String,
}

impl PropertyRecord {
    /// Whether the record carries enough numeric data to contribute to
    /// price/area averages.
    pub fn has_valid_figures(&self) -> bool {
        self.total_price > 0 && self.unit_price > 0 && self.area > 0.0
    }
}

/// Per-region ingestion metadata for one load run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionShard {
    pub region: String,
    /// Rows present in the source shard.
    pub raw_count: usize,
    /// Rows that survived normalization (malformed rows are dropped).
    pub normalized_count: usize,
    pub loaded_at: DateTime<Utc>,
}

impl RegionShard {
    pub fn new(region: impl Into<String>, raw_count: usize, normalized_count: usize) -> Self {
        debug_assert!(normalized_count <= raw_count);
        Self {
            region: region.into(),
            raw_count,
            normalized_count,
            loaded_at: Utc::now(),
        }
    }

    /// Rows dropped as malformed.
    pub fn dropped(&self) -> usize {
        self.raw_count - self.normalized_count
    }
}
