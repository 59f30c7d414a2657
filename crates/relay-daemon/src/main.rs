//! Process entry point: loads configuration, initializes logging, and
//! runs the daemon until it receives a shutdown signal.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use relay_daemon::config::DaemonConfig;
use relay_daemon::observability::{init_logging, LogFormat};

/// Agent relay daemon: router, storage, PTY spawner, cloud sync, consensus,
/// and dashboard, all in one process.
#[derive(Parser, Debug)]
#[command(name = "relay-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file. Defaults plus `RELAY_*`
    /// environment variables are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `logging.level` from the config file/environment.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
        config.validate_config()?;
    }

    init_logging(&config.logging.level, LogFormat::parse(&config.logging.format));

    tracing::info!(
        dashboard_addr = %config.dashboard.addr,
        metrics_addr = %config.metrics.addr,
        in_memory = config.store.in_memory,
        sync_enabled = config.sync.enabled(),
        "starting relay-daemon"
    );

    relay_daemon::run(config).await
}
