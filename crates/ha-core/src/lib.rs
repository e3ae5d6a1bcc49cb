//! Core functionality for the housing analytics platform
//!
//! This crate provides the domain model, the filter and aggregation
//! engines, and the coordinator that owns the canonical dataset.
//! Storage and ingestion implementations live in `ha-data`.

pub mod coordinator;
pub mod events;
pub mod filter;
pub mod model;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use coordinator::{DatasetCoordinator, FilterOptions, FilteredView, LoadStatus};
pub use events::{IngestEvent, Ingestor, LoadProgress};
pub use filter::{FilterPatch, FilterSpec};
pub use model::{PropertyRecord, Region, RegionShard};
pub use stats::{Statistics, StatsConfig};
pub use store::{PropertyStore, StorePredicate, StoreStats};
