//! Ingestion event protocol
//!
//! The ingestion worker communicates with the coordinator exclusively
//! through these events: no shared memory, every batch crosses the
//! channel as an owned message.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::PropertyRecord;

/// Outbound events emitted by an ingestion run.
///
/// Consumers are expected to match exhaustively; the set of variants is
/// the whole protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestEvent {
    /// Periodic status update.
    Progress { percent: u8, status: String },
    /// One region finished: its normalized batch and count.
    RegionComplete {
        region: String,
        region_name: String,
        count: usize,
        records: Vec<PropertyRecord>,
    },
    /// One region failed to fetch or parse; the run continues without it.
    RegionError { region: String, error: String },
    /// The run finished; `total_count` sums normalized rows across the
    /// regions that succeeded.
    Complete {
        total_count: usize,
        total_regions: usize,
    },
}

/// Progress snapshot exposed by the coordinator to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadProgress {
    pub percent: u8,
    pub status: String,
}

/// Anything that can run an ingestion and stream events back.
///
/// The worker in `ha-data` is the production implementation; tests swap
/// in scripted ones.
#[async_trait::async_trait]
pub trait Ingestor: Send + Sync {
    /// Start a run and hand back the event stream. The run owns its own
    /// task; dropping the receiver cancels nothing, already-committed
    /// batches stay committed.
    async fn start(&self) -> anyhow::Result<mpsc::Receiver<IngestEvent>>;
}
