//! Cloud sync queue (C6, §4.7): batches envelopes crossing the router,
//! compresses over a size threshold, POSTs them to a remote endpoint with
//! a bearer token, retries transient failures with backoff, and spills
//! unsent batches to disk when the retry budget is exhausted.
//!
//! [`SyncQueue`] implements [`relay_router::sink::EnvelopeSink`], so
//! `relay-daemon` wires it into the router the same way it wires in the
//! message store — every accepted envelope is handed to both.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod spill;
pub mod stats;

pub use client::{maybe_compress, post_with_retry, SyncAck};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use queue::SyncQueue;
pub use spill::SpillStore;
pub use stats::{SyncStats, SyncStatsSnapshot};
