//! # Daemon Configuration
//!
//! Layered configuration for `relay-daemon`:
//!
//! - Defaults baked into each section's `Default` impl
//! - An optional YAML file, merged over the defaults
//! - `RELAY_*` environment variables, merged over the file
//! - Validation via `validator` before any component is wired
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELAY_DASHBOARD_ADDR` | Dashboard HTTP/WebSocket listen address | `127.0.0.1:8080` |
//! | `RELAY_METRICS_ADDR` | Metrics endpoint | `127.0.0.1:9090` |
//! | `RELAY_LOG_LEVEL` | Log level | `info` |
//! | `RELAY_LOG_FORMAT` | Log format (`json`/`pretty`) | `pretty` |
//! | `RELAY_DATA_DIR` | Data directory (message store, spill, logs) | `./data` |
//! | `RELAY_SYNC_ENDPOINT_URL` | Cloud sync endpoint (unset disables sync) | *disabled* |
//! | `RELAY_SYNC_BEARER_TOKEN` | Cloud sync bearer token | *required when sync enabled* |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_daemon::config::DaemonConfig;
//!
//! let config = DaemonConfig::load(None).expect("invalid configuration");
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use validator::Validate;

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse environment variable {key}: {message}")]
    EnvParse { key: String, message: String },

    #[error("Failed to load configuration file: {0}")]
    FileLoad(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Top-level daemon configuration (§6 "Configuration knobs").
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct DaemonConfig {
    #[validate(nested)]
    pub dashboard: DashboardConfig,

    #[validate(nested)]
    pub metrics: MetricsConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,

    #[validate(nested)]
    pub store: StoreConfig,

    #[validate(nested)]
    pub pty: PtySectionConfig,

    #[validate(nested)]
    pub sync: SyncSectionConfig,

    #[validate(nested)]
    pub consensus: ConsensusSectionConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
            pty: PtySectionConfig::default(),
            sync: SyncSectionConfig::default(),
            consensus: ConsensusSectionConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads defaults, merges an optional TOML file, then merges
    /// `RELAY_*` environment variables, and validates the result.
    /// Mirrors `relay-daemon`'s documented refusal to start on bad
    /// configuration (§7): any error here happens before a single
    /// component is constructed.
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = match file_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env()?;
        config.validate_config()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::FileLoad(e.to_string()))
    }

    /// Overrides whatever is already set with any `RELAY_*` variable
    /// present in the environment.
    pub fn merge_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var("RELAY_DASHBOARD_ADDR") {
            self.dashboard.addr = addr.parse().map_err(|_| ConfigError::EnvParse {
                key: "RELAY_DASHBOARD_ADDR".to_string(),
                message: "invalid socket address".to_string(),
            })?;
        }
        if let Ok(addr) = std::env::var("RELAY_METRICS_ADDR") {
            self.metrics.addr = addr.parse().map_err(|_| ConfigError::EnvParse {
                key: "RELAY_METRICS_ADDR".to_string(),
                message: "invalid socket address".to_string(),
            })?;
        }
        if let Ok(enabled) = std::env::var("RELAY_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(true);
        }
        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(dir) = std::env::var("RELAY_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }
        if let Ok(ms) = std::env::var("RELAY_MESSAGE_RETENTION_MS") {
            self.store.message_retention_ms = ms.parse().map_err(|_| ConfigError::EnvParse {
                key: "RELAY_MESSAGE_RETENTION_MS".to_string(),
                message: "invalid integer".to_string(),
            })?;
        }
        if let Ok(prefix) = std::env::var("RELAY_RELAY_PREFIX") {
            self.pty.relay_prefix = prefix;
        }
        if let Ok(prefix) = std::env::var("RELAY_THINKING_PREFIX") {
            self.pty.thinking_prefix = prefix;
        }
        if let Ok(url) = std::env::var("RELAY_SYNC_ENDPOINT_URL") {
            self.sync.endpoint_url = Some(url);
        }
        if let Ok(token) = std::env::var("RELAY_SYNC_BEARER_TOKEN") {
            self.sync.bearer_token = Some(token);
        }
        if let Ok(timeout) = std::env::var("RELAY_CONSENSUS_DEFAULT_TIMEOUT_MS") {
            self.consensus.default_timeout_ms =
                timeout.parse().map_err(|_| ConfigError::EnvParse {
                    key: "RELAY_CONSENSUS_DEFAULT_TIMEOUT_MS".to_string(),
                    message: "invalid integer".to_string(),
                })?;
        }

        Ok(())
    }

    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level '{}'. valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log format '{}'. valid values: {:?}",
                self.logging.format, valid_formats
            )));
        }

        if self.sync.enabled() && self.sync.bearer_token.is_none() {
            return Err(ConfigError::Invalid(
                "sync.endpoint_url is set but sync.bearer_token is missing".to_string(),
            ));
        }

        Ok(())
    }
}

/// Dashboard HTTP/WebSocket surface (C9).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct DashboardConfig {
    pub addr: SocketAddr,
    pub cors_enabled: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().expect("valid default address"),
            cors_enabled: true,
        }
    }
}

/// Prometheus metrics endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "127.0.0.1:9090".parse().expect("valid default address"),
        }
    }
}

/// Structured logging.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Message store retention and on-disk location (C1/C2, §4.5).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,

    #[validate(range(min = 1))]
    pub message_retention_ms: i64,

    #[validate(range(min = 1000))]
    pub cleanup_interval_ms: u64,

    /// `true` runs the in-memory backend instead of RocksDB; used for
    /// development and tests.
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            message_retention_ms: 7 * 24 * 60 * 60 * 1000,
            cleanup_interval_ms: 60 * 60 * 1000,
            in_memory: false,
        }
    }
}

impl StoreConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn workers_file(&self) -> PathBuf {
        self.data_dir.join("workers.json")
    }
}

/// PTY wrapper timing and grammar tokens (C3, §4.2), flattened into the
/// daemon config under the `pty` key.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct PtySectionConfig {
    pub relay_prefix: String,
    pub thinking_prefix: String,

    #[validate(range(min = 1))]
    pub max_buffer_lines: usize,
    pub stability_timeout_ms: u64,
    pub stability_poll_ms: u64,
    pub required_stable_polls: u32,
    pub verification_timeout_ms: u64,
    pub enter_delay_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
    pub queue_process_delay_ms: u64,
}

impl Default for PtySectionConfig {
    fn default() -> Self {
        let defaults = relay_pty::PtyConfig::default();
        Self {
            relay_prefix: relay_patterns::DEFAULT_RELAY_PREFIX.to_string(),
            thinking_prefix: relay_patterns::DEFAULT_THINKING_PREFIX.to_string(),
            max_buffer_lines: defaults.max_buffer_lines,
            stability_timeout_ms: defaults.stability_timeout_ms,
            stability_poll_ms: defaults.stability_poll_ms,
            required_stable_polls: defaults.required_stable_polls,
            verification_timeout_ms: defaults.verification_timeout_ms,
            enter_delay_ms: defaults.enter_delay_ms,
            retry_backoff_ms: defaults.retry_backoff_ms,
            max_retries: defaults.max_retries,
            queue_process_delay_ms: defaults.queue_process_delay_ms,
        }
    }
}

impl PtySectionConfig {
    pub fn to_pty_config(&self) -> relay_pty::PtyConfig {
        relay_pty::PtyConfig {
            max_buffer_lines: self.max_buffer_lines,
            stability_timeout_ms: self.stability_timeout_ms,
            stability_poll_ms: self.stability_poll_ms,
            required_stable_polls: self.required_stable_polls,
            verification_timeout_ms: self.verification_timeout_ms,
            enter_delay_ms: self.enter_delay_ms,
            retry_backoff_ms: self.retry_backoff_ms,
            max_retries: self.max_retries,
            queue_process_delay_ms: self.queue_process_delay_ms,
            ..relay_pty::PtyConfig::default()
        }
    }
}

/// Cloud sync queue (C6, §4.7). `endpoint_url` absent means sync is off.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SyncSectionConfig {
    pub endpoint_url: Option<String>,
    pub bearer_token: Option<String>,

    #[validate(range(min = 1))]
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_batch_bytes: usize,
    pub compression_threshold: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_spill_files: usize,
}

impl Default for SyncSectionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            bearer_token: None,
            batch_size: 100,
            batch_delay_ms: 200,
            max_batch_bytes: 512 * 1024,
            compression_threshold: 1024,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_spill_files: 100,
        }
    }
}

impl SyncSectionConfig {
    pub fn enabled(&self) -> bool {
        self.endpoint_url.is_some()
    }

    pub fn to_sync_config(&self, spill_dir: PathBuf) -> Option<relay_sync::SyncConfig> {
        let endpoint_url = self.endpoint_url.clone()?;
        let bearer_token = self.bearer_token.clone().unwrap_or_default();
        Some(relay_sync::SyncConfig {
            endpoint_url,
            bearer_token,
            flush_count: self.batch_size,
            flush_interval_ms: self.batch_delay_ms,
            flush_bytes: self.max_batch_bytes,
            compression_threshold_bytes: self.compression_threshold,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_delay_ms,
            spill_dir,
            spill_cap: self.max_spill_files,
        })
    }
}

/// Proposal/vote tallying (C7, §4.8).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ConsensusSectionConfig {
    pub default_timeout_ms: u64,
    pub default_consensus_type: String,

    #[validate(range(min = 0.0, max = 1.0))]
    pub default_threshold: f64,
    pub allow_vote_change: bool,
    pub auto_resolve: bool,
    pub broadcast_proposals: bool,
}

impl Default for ConsensusSectionConfig {
    fn default() -> Self {
        let defaults = relay_consensus::ConsensusConfig::default();
        Self {
            default_timeout_ms: defaults.default_timeout_ms,
            default_consensus_type: "majority".to_string(),
            default_threshold: defaults.default_threshold,
            allow_vote_change: defaults.allow_vote_change,
            auto_resolve: defaults.auto_resolve,
            broadcast_proposals: defaults.broadcast_proposals,
        }
    }
}

impl ConsensusSectionConfig {
    pub fn to_consensus_config(&self) -> relay_consensus::ConsensusConfig {
        let default_consensus_type = match self.default_consensus_type.to_lowercase().as_str() {
            "unanimous" => relay_types::ConsensusType::Unanimous,
            "quorum" => relay_types::ConsensusType::Quorum,
            "supermajority" => relay_types::ConsensusType::Supermajority,
            "weighted" => relay_types::ConsensusType::Weighted,
            _ => relay_types::ConsensusType::Majority,
        };
        relay_consensus::ConsensusConfig {
            default_timeout_ms: self.default_timeout_ms,
            default_consensus_type,
            default_threshold: self.default_threshold,
            allow_vote_change: self.allow_vote_change,
            auto_resolve: self.auto_resolve,
            broadcast_proposals: self.broadcast_proposals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = DaemonConfig::default();
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn sync_requires_token_when_endpoint_set() {
        let mut config = DaemonConfig::default();
        config.sync.endpoint_url = Some("https://example.com/ingest".to_string());
        assert!(config.validate_config().is_err());
        config.sync.bearer_token = Some("token".to_string());
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = DaemonConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate_config().is_err());
    }
}
