//! Durable message store (C1) and dead-letter queue (C2) for the agent
//! relay daemon (§4.5, §4.6).
//!
//! Both are built on the same [`StoreBackend`] abstraction, so either can
//! run against [`RocksDbBackend`] (durable, default) or
//! [`InMemoryBackend`] (tests, ephemeral dev mode) without touching the
//! store logic itself.

#![forbid(unsafe_code)]

mod deadletter_store;
mod error;
mod memory_backend;
mod message_store;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;
mod traits;

pub use deadletter_store::DeadLetterStore;
pub use error::{Result, StorageError};
pub use memory_backend::InMemoryBackend;
pub use message_store::{MessageStore, StoreStats};
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::{RocksDbBackend, RocksDbConfig, TABLES};
pub use traits::{BackendStats, ScanRow, StoreBackend};
