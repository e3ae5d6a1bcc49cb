//! Background ingestion worker
//!
//! Loads every region shard in turn, normalizes rows, and streams batches
//! out as events. The worker holds no state across runs and never touches
//! the store; idempotent re-ingestion is the caller clearing prior data,
//! not worker-side deduplication.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ha_core::events::{IngestEvent, Ingestor};
use ha_core::model::{PropertyRecord, Region, RegionShard};

use super::fetcher::{FileShardFetcher, ShardFetcher};
use super::normalizer::{normalize_row, NormalizerConfig};
use super::regions::REGIONS;
use crate::DataError;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One-shot ingestion task over a fixed region list.
pub struct IngestWorker {
    fetcher: Arc<dyn ShardFetcher>,
    regions: Vec<Region>,
    config: NormalizerConfig,
}

impl IngestWorker {
    pub fn new(fetcher: impl ShardFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            regions: REGIONS.to_vec(),
            config: NormalizerConfig::default(),
        }
    }

    /// Worker over bundled shard files in `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(FileShardFetcher::new(dir))
    }

    /// Replace the region list (tests, partial loads).
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_config(mut self, config: NormalizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Fetch and normalize one region's shard.
    async fn load_region(
        fetcher: &dyn ShardFetcher,
        region: &Region,
        config: &NormalizerConfig,
    ) -> Result<(Vec<PropertyRecord>, RegionShard), DataError> {
        let text = fetcher.fetch(region.code).await?;
        let rows: Vec<Value> =
            serde_json::from_str(&text).map_err(|e| DataError::RegionParse {
                region: region.code.to_string(),
                message: e.to_string(),
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if let Some(record) = normalize_row(row, region, index, config) {
                records.push(record);
            }
        }

        let shard = RegionShard::new(region.code, rows.len(), records.len());
        if shard.dropped() > 0 {
            warn!(
                region = region.code,
                raw = shard.raw_count,
                normalized = shard.normalized_count,
                "dropped malformed rows"
            );
        }
        Ok((records, shard))
    }

    /// The run itself: regions load strictly sequentially, so peak memory
    /// stays at one shard. Every outcome crosses the channel as an event;
    /// a dropped receiver ends the run early (committed work stays put).
    async fn run(
        fetcher: Arc<dyn ShardFetcher>,
        regions: Vec<Region>,
        config: NormalizerConfig,
        tx: mpsc::Sender<IngestEvent>,
    ) {
        let total_regions = regions.len();
        let mut total_count = 0usize;

        for (index, region) in regions.iter().enumerate() {
            let percent = (index * 100 / total_regions.max(1)) as u8;
            let progress = IngestEvent::Progress {
                percent,
                status: format!("loading {}", region.name),
            };
            if tx.send(progress).await.is_err() {
                debug!("event receiver dropped, abandoning run");
                return;
            }

            let event = match Self::load_region(fetcher.as_ref(), region, &config).await {
                Ok((records, shard)) => {
                    info!(
                        region = region.code,
                        count = shard.normalized_count,
                        "region loaded"
                    );
                    total_count += records.len();
                    IngestEvent::RegionComplete {
                        region: region.code.to_string(),
                        region_name: region.name.to_string(),
                        count: records.len(),
                        records,
                    }
                }
                Err(e) => {
                    warn!(region = region.code, error = %e, "region failed");
                    IngestEvent::RegionError {
                        region: region.code.to_string(),
                        error: e.to_string(),
                    }
                }
            };
            if tx.send(event).await.is_err() {
                debug!("event receiver dropped, abandoning run");
                return;
            }
        }

        info!(total_count, total_regions, "ingestion run finished");
        let _ = tx
            .send(IngestEvent::Complete {
                total_count,
                total_regions,
            })
            .await;
    }
}

#[async_trait::async_trait]
impl Ingestor for IngestWorker {
    async fn start(&self) -> anyhow::Result<mpsc::Receiver<IngestEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let fetcher = self.fetcher.clone();
        let regions = self.regions.clone();
        let config = self.config.clone();
        tokio::spawn(Self::run(fetcher, regions, config, tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const REGION_A: Region = Region {
        code: "taipei",
        name: "台北市",
    };
    const REGION_B: Region = Region {
        code: "taoyuan",
        name: "桃園市",
    };

    fn row(district: &str, price_wan: i64) -> Value {
        json!({
            "區域": district,
            "建案名稱": "案A",
            "房型": "3",
            "面積(坪)": 25.0,
            "總價(萬)": price_wan,
            "單價(萬/坪)": 45,
            "交易年月日": "2024/06/01",
        })
    }

    fn write_shard(dir: &TempDir, region: &Region, rows: &[Value]) {
        let path = dir.path().join(format!("{}.json", region.code));
        std::fs::write(path, serde_json::to_string(&rows).unwrap()).unwrap();
    }

    async fn collect_events(worker: IngestWorker) -> Vec<IngestEvent> {
        let mut rx = worker.start().await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn two_regions_sum_into_complete() {
        let dir = TempDir::new().unwrap();
        write_shard(&dir, &REGION_A, &[row("信義區", 2800), row("大安區", 2200), row("中山區", 1900)]);
        write_shard(&dir, &REGION_B, &(0..5).map(|i| row("中壢區", 900 + i)).collect::<Vec<_>>());

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A, REGION_B]);
        let events = collect_events(worker).await;

        let counts: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                IngestEvent::RegionComplete { count, .. } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![3, 5]);

        match events.last().unwrap() {
            IngestEvent::Complete {
                total_count,
                total_regions,
            } => {
                assert_eq!(*total_count, 8);
                assert_eq!(*total_regions, 2);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batches_carry_normalized_records() {
        let dir = TempDir::new().unwrap();
        write_shard(&dir, &REGION_A, &[row("信義區", 2800)]);

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A]);
        let events = collect_events(worker).await;

        let records = events
            .iter()
            .find_map(|e| match e {
                IngestEvent::RegionComplete { records, .. } => Some(records),
                _ => None,
            })
            .unwrap();
        assert_eq!(records[0].region, "taipei");
        assert_eq!(records[0].room_type, "3 room(s)");
        assert_eq!(records[0].total_price, 28_000_000);
        assert_eq!(
            records[0].transaction_date,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[tokio::test]
    async fn missing_shard_is_isolated_to_its_region() {
        let dir = TempDir::new().unwrap();
        write_shard(&dir, &REGION_A, &[row("信義區", 2800), row("大安區", 2200), row("中山區", 1900)]);
        // No shard for REGION_B.

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A, REGION_B]);
        let events = collect_events(worker).await;

        let failed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                IngestEvent::RegionError { region, .. } => Some(region.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec!["taoyuan"]);

        match events.last().unwrap() {
            IngestEvent::Complete {
                total_count,
                total_regions,
            } => {
                // The failed region contributes zero records but still
                // counts toward the region total.
                assert_eq!(*total_count, 3);
                assert_eq!(*total_regions, 2);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_shard_reports_region_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("taipei.json"), "not json at all").unwrap();

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A]);
        let events = collect_events(worker).await;

        assert!(events
            .iter()
            .any(|e| matches!(e, IngestEvent::RegionError { region, .. } if region == "taipei")));
    }

    #[tokio::test]
    async fn malformed_rows_are_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_shard(
            &dir,
            &REGION_A,
            &[row("信義區", 2800), json!("not an object"), row("大安區", 2200)],
        );

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A]);
        let events = collect_events(worker).await;

        match events.last().unwrap() {
            IngestEvent::Complete { total_count, .. } => assert_eq!(*total_count, 2),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn progress_precedes_each_region() {
        let dir = TempDir::new().unwrap();
        write_shard(&dir, &REGION_A, &[row("信義區", 2800)]);
        write_shard(&dir, &REGION_B, &[row("中壢區", 900)]);

        let worker = IngestWorker::from_dir(dir.path()).with_regions(vec![REGION_A, REGION_B]);
        let events = collect_events(worker).await;

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                IngestEvent::Progress { .. } => "progress",
                IngestEvent::RegionComplete { .. } => "region",
                IngestEvent::RegionError { .. } => "error",
                IngestEvent::Complete { .. } => "complete",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["progress", "region", "progress", "region", "complete"]
        );

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                IngestEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 50]);
    }
}
