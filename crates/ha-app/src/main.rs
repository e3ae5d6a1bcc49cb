//! Main application entry point
//!
//! Wires the SQLite store, the ingestion worker, and the coordinator
//! together: restore from a previous session when possible, otherwise
//! ingest the shard directory, then print a dataset summary.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ha_core::{DatasetCoordinator, PropertyStore};
use ha_data::{IngestWorker, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = CliArgs::parse(std::env::args().skip(1))?;

    let store = Arc::new(SqliteStore::new(&cli.db_path));
    // A failed init is fatal; there is no in-memory fallback.
    store.init().await.context("store initialization failed")?;

    let coordinator = Arc::new(DatasetCoordinator::new(store));

    let restored = !cli.force_reload && coordinator.try_restore().await?;
    if !restored {
        let worker = IngestWorker::from_dir(&cli.data_dir);

        // Mirror worker progress into the log while the load runs.
        let mut progress = coordinator.progress();
        let reporter = tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let update = progress.borrow().clone();
                info!(percent = update.percent, status = %update.status, "progress");
            }
        });

        let summary = coordinator.load(&worker).await?;
        reporter.abort();

        info!(
            total = summary.total_count,
            regions = summary.total_regions,
            failed = summary.failed_regions.len(),
            "ingestion finished"
        );
        for region in &summary.failed_regions {
            tracing::warn!(%region, "region contributed no records");
        }
    }

    print_summary(&coordinator);
    Ok(())
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    data_dir: String,
    db_path: String,
    force_reload: bool,
}

impl CliArgs {
    /// Flags are recognized anywhere; positionals keep their order.
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut force_reload = false;
        let mut positional = Vec::new();
        for arg in args {
            match arg.as_str() {
                "--reload" => force_reload = true,
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let data_dir = positional
            .next()
            .context("usage: housing-analytics <shard-dir> [db-path] [--reload]")?;
        let db_path = positional.next().unwrap_or_else(|| "properties.db".to_string());
        Ok(Self {
            data_dir,
            db_path,
            force_reload,
        })
    }
}

fn print_summary(coordinator: &DatasetCoordinator) {
    let stats = coordinator.statistics();
    let options = coordinator.filter_options();

    println!("records:         {}", stats.count);
    println!("with figures:    {}", stats.valid_count);
    println!("avg total price: {:.1} 萬", stats.avg_total_price);
    println!("avg unit price:  {:.2} 萬/坪", stats.avg_unit_price);
    println!("avg area:        {:.1} 坪", stats.avg_area);
    println!(
        "median area:     {:.1} 坪{}",
        stats.median_area,
        if stats.median_is_approximate {
            " (approximate)"
        } else {
            ""
        }
    );
    println!(
        "regions: {}, districts: {}, projects: {}, room types: {}",
        options.regions.len(),
        options.districts.len(),
        options.projects.len(),
        options.room_types.len()
    );
}
