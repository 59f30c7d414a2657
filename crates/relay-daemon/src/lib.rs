//! # relay-daemon
//!
//! The process that actually runs an agent relay: it reads a
//! [`config::DaemonConfig`], opens the message store and dead-letter
//! queue against whichever backend is configured, wires the router's
//! storage/sync/consensus collaborators, starts the PTY spawner, and
//! serves the dashboard, health, and metrics HTTP surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      relay-daemon                         │
//! ├───────────────────────────────────────────────────────────┤
//! │  dashboard (relay-web)  │  health probes  │  /metrics      │
//! ├───────────────────────────────────────────────────────────┤
//! │  router (relay-router) ── consensus (relay-consensus)     │
//! │      │         │                                          │
//! │  store/dlq   sync queue                                   │
//! │  (relay-storage)  (relay-sync)                            │
//! ├───────────────────────────────────────────────────────────┤
//! │            spawner + PTY wrappers (relay-spawner/-pty)    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - layered configuration (defaults, YAML file, env, validation)
//! - [`backend`] - runtime-selected storage backend (in-memory vs. RocksDB)
//! - [`sinks`] - adapters wiring storage/sync into the router's hooks
//! - [`daemon`] - component construction and the run loop
//! - [`health`] - liveness/readiness probes
//! - [`observability`] - structured logging and Prometheus metrics

pub mod backend;
pub mod config;
pub mod daemon;
pub mod health;
pub mod observability;
pub mod sinks;

pub use daemon::run;
