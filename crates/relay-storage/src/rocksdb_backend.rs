//! The durable `StoreBackend` implementation, backed by RocksDB.
//!
//! One column family per logical table (messages, sessions, summaries,
//! dead letters). Column families are created idempotently on open so an
//! older on-disk database picks up a schema addition without a manual
//! migration step (§4.5 "schema migrations").

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch, DB,
};

use crate::error::{Result, StorageError};
use crate::traits::{BackendStats, ScanRow, StoreBackend};

/// The full set of column families this backend knows how to serve.
/// Opening with a superset is safe and required for forward migrations:
/// a database created by an older binary missing a table is upgraded the
/// first time it's opened by a binary that knows about it.
pub const TABLES: &[&str] = &["messages", "sessions", "summaries", "deadletters"];

/// RocksDB storage configuration (§3.1 `StoreConfig`).
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: std::path::PathBuf,
    pub write_buffer_size: usize,
    pub max_write_buffers: i32,
    pub target_file_size: u64,
    pub background_jobs: i32,
    pub wal_enabled: bool,
    pub compression_enabled: bool,
    pub block_cache_size: usize,
    pub bloom_filter_bits: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: std::path::PathBuf::from("./data/relay-store"),
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffers: 3,
            target_file_size: 64 * 1024 * 1024,
            background_jobs: 4,
            wal_enabled: true,
            compression_enabled: true,
            block_cache_size: 128 * 1024 * 1024,
            bloom_filter_bits: 10,
        }
    }
}

pub struct RocksDbBackend {
    db: DBWithThreadMode<MultiThreaded>,
    #[allow(dead_code)]
    config: RocksDbConfig,
    stats: RocksDbStats,
}

#[derive(Debug, Default)]
struct RocksDbStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl RocksDbBackend {
    /// Opens or creates a RocksDB database at `config.path`, creating any
    /// column family in [`TABLES`] that is missing.
    pub fn open(config: RocksDbConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffers);
        opts.set_target_file_size_base(config.target_file_size);
        opts.increase_parallelism(config.background_jobs);
        opts.set_max_background_jobs(config.background_jobs);

        if config.compression_enabled {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        if config.bloom_filter_bits > 0 {
            block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        }
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        let cf_opts = opts.clone();
        let cfs = TABLES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, &config.path, cfs)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            db,
            config,
            stats: RocksDbStats::default(),
        })
    }

    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        })
    }

    fn cf(&self, table: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(table)
            .ok_or_else(|| StorageError::MissingColumnFamily(table.to_string()))
    }
}

impl StoreBackend for RocksDbBackend {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put_cf(self.cf(table)?, key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        self.db
            .get_cf(self.cf(table)?, key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
        let existed = self.get(table, key)?.is_some();
        self.db
            .delete_cf(self.cf(table)?, key)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if existed {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>> {
        let cf = self.cf(table)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        Ok(rows)
    }

    fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>> {
        let cf = self.cf(table)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn batch_put(&self, table: &str, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        let cf = self.cf(table)?;
        let mut batch = WriteBatch::default();
        let count = items.len() as u64;
        for (key, value) in items {
            batch.put_cf(cf, key, value);
        }
        self.db
            .write(batch)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.stats.writes.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        for table in TABLES {
            self.db
                .flush_cf(self.cf(table)?)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        for table in TABLES {
            self.db
                .compact_range_cf(self.cf(table)?, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        BackendStats {
            reads: self.stats.reads.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            disk_size_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_all_tables() {
        let dir = tempdir().unwrap();
        let backend = RocksDbBackend::open_default(dir.path()).unwrap();
        for table in TABLES {
            assert!(backend.cf(table).is_ok());
        }
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = RocksDbBackend::open_default(dir.path()).unwrap();
        backend.put("messages", b"k1", b"v1").unwrap();
        assert_eq!(backend.get("messages", b"k1").unwrap(), Some(b"v1".to_vec()));
        assert!(backend.delete("messages", b"k1").unwrap());
        assert_eq!(backend.get("messages", b"k1").unwrap(), None);
    }

    #[test]
    fn scan_prefix_stops_at_boundary() {
        let dir = tempdir().unwrap();
        let backend = RocksDbBackend::open_default(dir.path()).unwrap();
        backend.put("messages", b"ts:0001", b"a").unwrap();
        backend.put("messages", b"ts:0002", b"b").unwrap();
        backend.put("messages", b"zz:0001", b"c").unwrap();
        let rows = backend.scan_prefix("messages", b"ts:").unwrap();
        assert_eq!(rows.len(), 2);
    }
}
