//! Runtime-selected storage backend.
//!
//! `MessageStore<B>`/`DeadLetterStore<B>` are generic over `StoreBackend`,
//! but the concrete backend (in-memory vs. RocksDB) is only known once
//! `StoreConfig::in_memory` is read at startup. `Arc<dyn StoreBackend>`
//! can't stand in for `B` directly — the blanket `impl<T: StoreBackend>
//! StoreBackend for Arc<T>` requires `T: Sized`, which `dyn StoreBackend`
//! isn't — so this enum dispatches to whichever concrete backend is live.

use relay_storage::{InMemoryBackend, Result, RocksDbBackend, RocksDbConfig, ScanRow, StoreBackend};

pub enum Backend {
    Memory(InMemoryBackend),
    RocksDb(RocksDbBackend),
}

impl Backend {
    pub fn open(config: &crate::config::StoreConfig) -> anyhow::Result<Self> {
        if config.in_memory {
            return Ok(Backend::Memory(InMemoryBackend::new()));
        }
        std::fs::create_dir_all(&config.data_dir)?;
        let rocks_config = RocksDbConfig {
            path: config.db_path(),
            ..RocksDbConfig::default()
        };
        Ok(Backend::RocksDb(RocksDbBackend::open(rocks_config)?))
    }
}

impl StoreBackend for Backend {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            Backend::Memory(b) => b.put(table, key, value),
            Backend::RocksDb(b) => b.put(table, key, value),
        }
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Backend::Memory(b) => b.get(table, key),
            Backend::RocksDb(b) => b.get(table, key),
        }
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
        match self {
            Backend::Memory(b) => b.delete(table, key),
            Backend::RocksDb(b) => b.delete(table, key),
        }
    }

    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>> {
        match self {
            Backend::Memory(b) => b.scan_prefix(table, prefix),
            Backend::RocksDb(b) => b.scan_prefix(table, prefix),
        }
    }

    fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>> {
        match self {
            Backend::Memory(b) => b.scan_all(table),
            Backend::RocksDb(b) => b.scan_all(table),
        }
    }

    fn batch_put(&self, table: &str, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        match self {
            Backend::Memory(b) => b.batch_put(table, items),
            Backend::RocksDb(b) => b.batch_put(table, items),
        }
    }

    fn flush(&self) -> Result<()> {
        match self {
            Backend::Memory(b) => b.flush(),
            Backend::RocksDb(b) => b.flush(),
        }
    }

    fn compact(&self) -> Result<()> {
        match self {
            Backend::Memory(b) => b.compact(),
            Backend::RocksDb(b) => b.compact(),
        }
    }

    fn stats(&self) -> relay_storage::BackendStats {
        match self {
            Backend::Memory(b) => b.stats(),
            Backend::RocksDb(b) => b.stats(),
        }
    }
}
