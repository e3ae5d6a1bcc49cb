//! Data acquisition and persistence for the housing analytics platform
//!
//! Home of the region shard ingestion pipeline (fetch → normalize →
//! events) and the SQLite implementation of the `PropertyStore` trait.

pub mod ingest;
pub mod store;

use thiserror::Error;

// Re-exports
pub use ingest::fetcher::{FileShardFetcher, ShardFetcher};
pub use ingest::normalizer::{NormalizerConfig, ACCEPTED_YEARS};
pub use ingest::regions::REGIONS;
pub use ingest::worker::IngestWorker;
pub use store::SqliteStore;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("store initialization failed: {0}")]
    StoreInit(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("failed to fetch shard '{region}': {message}")]
    RegionFetch { region: String, message: String },

    #[error("failed to parse shard '{region}': {message}")]
    RegionParse { region: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
