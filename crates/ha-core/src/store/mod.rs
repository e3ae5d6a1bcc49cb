//! Persistent store trait
//!
//! The trait lives here so the coordinator can be wired against any
//! backend; the SQLite implementation lives in `ha-data`.

use serde_json::Value;

use crate::model::PropertyRecord;

/// Exact-equality predicate for the store's convenience query path.
///
/// Populated fields must match exactly; empty predicate matches
/// everything. Multi-value and range filtering belong to the in-memory
/// filter engine, not the store.
#[derive(Debug, Clone, Default)]
pub struct StorePredicate {
    pub region: Option<String>,
    pub district: Option<String>,
    pub project: Option<String>,
    pub room_type: Option<String>,
}

impl StorePredicate {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.district.is_none()
            && self.project.is_none()
            && self.room_type.is_none()
    }
}

/// Full-scan store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub distinct_regions: usize,
}

/// Durable record store with a key-value metadata side table.
///
/// All operations are asynchronous and may suspend the caller. Batched
/// writes are atomic: a concurrent reader observes either the pre-batch
/// or the post-batch state, never an interleaved one.
#[async_trait::async_trait]
pub trait PropertyStore: Send + Sync {
    /// Create/open the backing storage. Failure here is fatal for the
    /// session; there is no degraded in-memory mode.
    async fn init(&self) -> anyhow::Result<()>;

    /// Append a batch inside one atomic transaction and return the number
    /// of records written. Any single-record failure aborts the whole
    /// batch; the store never retries internally.
    async fn add_batch(&self, records: &[PropertyRecord]) -> anyhow::Result<usize>;

    /// Fetch up to `limit` records in insertion order; `limit == 0` means
    /// no limit.
    async fn get_all(&self, limit: usize) -> anyhow::Result<Vec<PropertyRecord>>;

    /// Fetch records matching the exact-equality predicate.
    async fn query(
        &self,
        predicate: &StorePredicate,
        limit: usize,
    ) -> anyhow::Result<Vec<PropertyRecord>>;

    /// Total record count and distinct-region count.
    async fn count(&self) -> anyhow::Result<StoreStats>;

    /// Delete every record atomically, leaving indexes intact.
    async fn clear_all(&self) -> anyhow::Result<()>;

    /// Read a metadata value, `None` when absent. Metadata transactions
    /// are independent of the record table.
    async fn get_metadata(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Write a metadata value, replacing any previous one.
    async fn set_metadata(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Release the backing storage.
    async fn close(&self) -> anyhow::Result<()>;
}
