//! Region shard ingestion pipeline

pub mod fetcher;
pub mod normalizer;
pub mod regions;
pub mod worker;
