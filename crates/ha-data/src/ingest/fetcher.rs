//! Shard transport abstraction
//!
//! The worker only needs raw shard text keyed by region code; where that
//! text comes from (bundled files in production, scripted sources in
//! tests) sits behind this trait.

use std::path::{Path, PathBuf};

use crate::DataError;

/// Fetch one region's raw shard content.
#[async_trait::async_trait]
pub trait ShardFetcher: Send + Sync {
    async fn fetch(&self, region: &str) -> Result<String, DataError>;
}

/// Reads `<dir>/<region>.json` from disk.
pub struct FileShardFetcher {
    dir: PathBuf,
}

impl FileShardFetcher {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl ShardFetcher for FileShardFetcher {
    async fn fetch(&self, region: &str) -> Result<String, DataError> {
        let path = self.dir.join(format!("{region}.json"));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DataError::RegionFetch {
                region: region.to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }
}
