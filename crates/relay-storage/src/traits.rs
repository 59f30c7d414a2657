//! The backend abstraction both the message store and the dead-letter
//! queue are built on (§4.5 "backend plurality", §4.6).
//!
//! A backend is a column-family-shaped byte store: callers address rows by
//! a `table` name and a raw key, and get raw bytes back. The message store
//! and DLQ layer typed records and secondary-index scans on top of this;
//! the backend itself knows nothing about envelopes or sessions.

use std::sync::Arc;

use crate::error::Result;

/// One row as returned by a range scan: `(key, value)`.
pub type ScanRow = (Vec<u8>, Vec<u8>);

/// Pluggable storage backend: at least `RocksDbBackend` (durable, default)
/// and `InMemoryBackend` (tests, ephemeral dev mode) implement this.
pub trait StoreBackend: Send + Sync {
    /// Writes `value` under `key` in `table`, creating the table on first use.
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Reads the value stored under `key` in `table`, if any.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Removes `key` from `table`; returns whether it was present.
    fn delete(&self, table: &str, key: &[u8]) -> Result<bool>;

    /// Returns every row in `table` whose key starts with `prefix`, in key
    /// order. Used for ordered scans (e.g. by timestamp-prefixed key).
    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>>;

    /// Returns every row in `table`. Only safe for tables expected to stay
    /// small (agent summaries, sessions) — the message table is always
    /// accessed through `scan_prefix` on its timestamp-ordered key.
    fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>>;

    /// Applies `items` atomically where the backend supports it.
    fn batch_put(&self, table: &str, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        for (key, value) in items {
            self.put(table, &key, &value)?;
        }
        Ok(())
    }

    /// Flushes any buffered writes to durable storage.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Compacts the backend to reclaim space from deleted rows.
    fn compact(&self) -> Result<()> {
        Ok(())
    }

    /// Returns backend-level statistics.
    fn stats(&self) -> BackendStats {
        BackendStats::default()
    }
}

impl<T: StoreBackend> StoreBackend for Arc<T> {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(table, key, value)
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(table, key)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
        (**self).delete(table, key)
    }

    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>> {
        (**self).scan_prefix(table, prefix)
    }

    fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>> {
        (**self).scan_all(table)
    }

    fn batch_put(&self, table: &str, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        (**self).batch_put(table, items)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn compact(&self) -> Result<()> {
        (**self).compact()
    }

    fn stats(&self) -> BackendStats {
        (**self).stats()
    }
}

/// Backend-level read/write counters, surfaced through `MessageStore::stats`.
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub disk_size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MockBackend {
        tables: Mutex<std::collections::HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>>,
    }

    impl StoreBackend for MockBackend {
        fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
            self.tables
                .lock()
                .entry(table.to_string())
                .or_default()
                .insert(key.to_vec(), value.to_vec());
            Ok(())
        }

        fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self
                .tables
                .lock()
                .get(table)
                .and_then(|t| t.get(key).cloned()))
        }

        fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
            Ok(self
                .tables
                .lock()
                .get_mut(table)
                .map(|t| t.remove(key).is_some())
                .unwrap_or(false))
        }

        fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>> {
            Ok(self
                .tables
                .lock()
                .get(table)
                .map(|t| {
                    t.range(prefix.to_vec()..)
                        .take_while(|(k, _)| k.starts_with(prefix))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default())
        }

        fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>> {
            Ok(self
                .tables
                .lock()
                .get(table)
                .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default())
        }
    }

    #[test]
    fn arc_blanket_impl_delegates() {
        let backend = Arc::new(MockBackend::default());
        backend.put("t", b"k", b"v").unwrap();
        assert_eq!(backend.get("t", b"k").unwrap(), Some(b"v".to_vec()));
        assert!(backend.delete("t", b"k").unwrap());
        assert_eq!(backend.get("t", b"k").unwrap(), None);
    }

    #[test]
    fn scan_prefix_respects_ordering_and_boundary() {
        let backend = MockBackend::default();
        backend.put("t", b"msg:0001", b"a").unwrap();
        backend.put("t", b"msg:0002", b"b").unwrap();
        backend.put("t", b"other:0001", b"c").unwrap();
        let rows = backend.scan_prefix("t", b"msg:").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, b"a");
        assert_eq!(rows[1].1, b"b");
    }
}
