//! Reactive coordinator owning the canonical dataset
//!
//! The coordinator drives ingestion, populates the canonical in-memory
//! record set from the persistent store, and keeps the derived filtered
//! view and statistics in sync with the current filter spec. Filtering
//! and aggregation are synchronous and recomputed in full on every
//! change; only ingestion and store access suspend.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::events::{IngestEvent, Ingestor, LoadProgress};
use crate::filter::{self, FilterPatch, FilterSpec};
use crate::model::PropertyRecord;
use crate::stats::{self, Statistics, StatsConfig};
use crate::store::PropertyStore;

/// Metadata key recording the last completed load, used for change
/// detection on restore.
pub const LAST_LOAD_KEY: &str = "last_load";

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Uninitialized,
    Loading,
    Ready,
}

/// Distinct values available for filtering, in first-seen (ingestion)
/// order. Regions pair code with display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub regions: Vec<(String, String)>,
    pub districts: Vec<String>,
    pub projects: Vec<String>,
    pub room_types: Vec<String>,
}

/// Outcome of one completed ingestion run.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub total_count: usize,
    pub total_regions: usize,
    /// Regions that contributed zero records because their fetch or parse
    /// failed.
    pub failed_regions: Vec<String>,
}

/// Cheap snapshot of the current filtered view.
///
/// Holds the canonical set and the matching indices behind `Arc`s, so the
/// presentation layer can iterate without copying records.
#[derive(Clone)]
pub struct FilteredView {
    records: Arc<Vec<PropertyRecord>>,
    indices: Arc<Vec<usize>>,
}

impl FilteredView {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&PropertyRecord> {
        self.indices.get(position).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyRecord> {
        self.indices.iter().map(|&i| &self.records[i])
    }
}

struct CoordinatorState {
    status: LoadStatus,
    records: Arc<Vec<PropertyRecord>>,
    filters: FilterSpec,
    filtered: Arc<Vec<usize>>,
    statistics: Statistics,
    options: FilterOptions,
}

/// Owner of the canonical dataset and everything derived from it.
///
/// The store is injected at construction; there is no ambient global.
pub struct DatasetCoordinator {
    store: Arc<dyn PropertyStore>,
    stats_config: StatsConfig,
    state: RwLock<CoordinatorState>,
    progress_tx: watch::Sender<LoadProgress>,
}

impl DatasetCoordinator {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self::with_stats_config(store, StatsConfig::default())
    }

    pub fn with_stats_config(store: Arc<dyn PropertyStore>, stats_config: StatsConfig) -> Self {
        let (progress_tx, _) = watch::channel(LoadProgress::default());
        Self {
            store,
            stats_config,
            state: RwLock::new(CoordinatorState {
                status: LoadStatus::Uninitialized,
                records: Arc::new(Vec::new()),
                filters: FilterSpec::default(),
                filtered: Arc::new(Vec::new()),
                statistics: Statistics::default(),
                options: FilterOptions::default(),
            }),
            progress_tx,
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.state.read().status
    }

    /// Subscribe to load progress updates.
    pub fn progress(&self) -> watch::Receiver<LoadProgress> {
        self.progress_tx.subscribe()
    }

    /// Records in the canonical set.
    pub fn record_count(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn filters(&self) -> FilterSpec {
        self.state.read().filters.clone()
    }

    pub fn filtered_view(&self) -> FilteredView {
        let state = self.state.read();
        FilteredView {
            records: state.records.clone(),
            indices: state.filtered.clone(),
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.state.read().statistics.clone()
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.state.read().options.clone()
    }

    /// Run a full ingestion: clear prior data, stream worker events into
    /// the store, then populate the canonical set from the store.
    ///
    /// Region failures are reported in the summary and do not halt the
    /// run; a store transaction failure aborts it.
    pub async fn load(&self, ingestor: &dyn Ingestor) -> anyhow::Result<IngestSummary> {
        {
            let mut state = self.state.write();
            if state.status == LoadStatus::Loading {
                anyhow::bail!("a load is already in progress");
            }
            state.status = LoadStatus::Loading;
        }

        match self.run_ingestion(ingestor).await {
            Ok(summary) => {
                self.populate_from_store().await?;
                Ok(summary)
            }
            Err(e) => {
                // Committed batches stay committed; fall back to whatever
                // state the canonical set is in.
                let mut state = self.state.write();
                state.status = if state.records.is_empty() {
                    LoadStatus::Uninitialized
                } else {
                    LoadStatus::Ready
                };
                Err(e)
            }
        }
    }

    /// Explicit reload: same as [`load`](Self::load), kept separate so the
    /// Ready → Loading transition reads at the call site.
    pub async fn reload(&self, ingestor: &dyn Ingestor) -> anyhow::Result<IngestSummary> {
        info!("reloading dataset");
        self.load(ingestor).await
    }

    /// If the store already holds records from a previous session,
    /// populate the canonical set directly without ingesting. Returns
    /// whether anything was restored.
    pub async fn try_restore(&self) -> anyhow::Result<bool> {
        let stats = self.store.count().await?;
        if stats.total == 0 {
            return Ok(false);
        }

        if let Some(meta) = self.store.get_metadata(LAST_LOAD_KEY).await? {
            let recorded = meta.get("record_count").and_then(|v| v.as_u64());
            if recorded != Some(stats.total as u64) {
                warn!(
                    recorded = ?recorded,
                    live = stats.total,
                    "stored record count differs from last load metadata"
                );
            }
        }

        info!(total = stats.total, "restoring dataset from store");
        self.populate_from_store().await?;
        Ok(true)
    }

    /// Merge a partial filter update and synchronously recompute the
    /// filtered view and statistics.
    pub fn set_filters(&self, patch: FilterPatch) {
        let mut state = self.state.write();
        state.filters = patch.apply_to(state.filters.clone());
        Self::recompute(&mut state, &self.stats_config);
    }

    /// Replace the filter spec wholesale.
    pub fn set_filter_spec(&self, spec: FilterSpec) {
        let mut state = self.state.write();
        state.filters = spec.sanitized();
        Self::recompute(&mut state, &self.stats_config);
    }

    /// Reset to the unrestricted view.
    pub fn clear_filters(&self) {
        let mut state = self.state.write();
        state.filters = FilterSpec::default();
        Self::recompute(&mut state, &self.stats_config);
    }

    async fn run_ingestion(&self, ingestor: &dyn Ingestor) -> anyhow::Result<IngestSummary> {
        let prior = self.store.count().await?;
        if prior.total > 0 {
            info!(total = prior.total, "clearing previous dataset");
            self.store.clear_all().await?;
        }

        let mut events = ingestor.start().await?;
        let mut failed_regions = Vec::new();

        while let Some(event) = events.recv().await {
            match event {
                IngestEvent::Progress { percent, status } => {
                    self.progress_tx.send_replace(LoadProgress { percent, status });
                }
                IngestEvent::RegionComplete {
                    region,
                    region_name,
                    count,
                    records,
                } => {
                    let written = self.store.add_batch(&records).await?;
                    info!(%region, count, written, "region batch committed");
                    let percent = self.progress_tx.borrow().percent;
                    self.progress_tx.send_replace(LoadProgress {
                        percent,
                        status: format!("{region_name} loaded ({count} records)"),
                    });
                }
                IngestEvent::RegionError { region, error } => {
                    warn!(%region, %error, "region failed, continuing");
                    let percent = self.progress_tx.borrow().percent;
                    self.progress_tx.send_replace(LoadProgress {
                        percent,
                        status: format!("{region} failed: {error}"),
                    });
                    failed_regions.push(region);
                }
                IngestEvent::Complete {
                    total_count,
                    total_regions,
                } => {
                    info!(total_count, total_regions, "ingestion complete");
                    self.store
                        .set_metadata(
                            LAST_LOAD_KEY,
                            json!({
                                "record_count": total_count,
                                "total_regions": total_regions,
                                "loaded_at": chrono::Utc::now().to_rfc3339(),
                            }),
                        )
                        .await?;
                    self.progress_tx.send_replace(LoadProgress {
                        percent: 100,
                        status: format!("{total_count} records loaded"),
                    });
                    return Ok(IngestSummary {
                        total_count,
                        total_regions,
                        failed_regions,
                    });
                }
            }
        }

        // The worker went away without its final event (terminated
        // mid-run). Committed batches remain committed.
        anyhow::bail!("ingestion ended before completing")
    }

    async fn populate_from_store(&self) -> anyhow::Result<()> {
        let records = self.store.get_all(0).await?;
        info!(count = records.len(), "canonical dataset populated");

        let options = derive_options(&records);
        let mut state = self.state.write();
        state.records = Arc::new(records);
        state.options = options;
        state.status = LoadStatus::Ready;
        Self::recompute(&mut state, &self.stats_config);
        Ok(())
    }

    fn recompute(state: &mut CoordinatorState, cfg: &StatsConfig) {
        let indices = filter::matching_indices(&state.records, &state.filters);
        state.statistics = stats::compute(indices.iter().map(|&i| &state.records[i]), cfg);
        state.filtered = Arc::new(indices);
    }
}

/// Collect distinct filterable values in first-seen order. One iterative
/// pass; sets are converted to lists with `collect`, never recursively.
fn derive_options(records: &[PropertyRecord]) -> FilterOptions {
    let mut regions: IndexMap<&str, &str> = IndexMap::new();
    let mut districts: IndexSet<&str> = IndexSet::new();
    let mut projects: IndexSet<&str> = IndexSet::new();
    let mut room_types: IndexSet<&str> = IndexSet::new();

    for record in records {
        if !record.region.is_empty() {
            regions.entry(&record.region).or_insert(&record.region_name);
        }
        if !record.district.is_empty() {
            districts.insert(&record.district);
        }
        if !record.project.is_empty() {
            projects.insert(&record.project);
        }
        if !record.room_type.is_empty() {
            room_types.insert(&record.room_type);
        }
    }

    FilterOptions {
        regions: regions
            .into_iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect(),
        districts: districts.into_iter().map(str::to_string).collect(),
        projects: projects.into_iter().map(str::to_string).collect(),
        room_types: room_types.into_iter().map(str::to_string).collect(),
    }
}
