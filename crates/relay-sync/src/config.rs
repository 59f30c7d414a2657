//! Tunables for the cloud sync queue (§4.7 "Flush triggers").

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub endpoint_url: String,
    pub bearer_token: String,

    pub flush_count: usize,
    pub flush_interval_ms: u64,
    pub flush_bytes: usize,

    pub compression_threshold_bytes: usize,

    pub max_retries: u32,
    pub retry_backoff_ms: u64,

    pub spill_dir: PathBuf,
    pub spill_cap: usize,
}

impl SyncConfig {
    pub fn new(endpoint_url: impl Into<String>, bearer_token: impl Into<String>, spill_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            bearer_token: bearer_token.into(),
            flush_count: 100,
            flush_interval_ms: 200,
            flush_bytes: 512 * 1024,
            compression_threshold_bytes: 1024,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            spill_dir: spill_dir.into(),
            spill_cap: 100,
        }
    }
}
