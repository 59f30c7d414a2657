//! An ephemeral, in-process `StoreBackend` used for tests and dev mode
//! (§4.5 "backend plurality").

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;
use crate::traits::{BackendStats, ScanRow, StoreBackend};

#[derive(Default)]
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for InMemoryBackend {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(key).cloned()))
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
        let existed = self
            .tables
            .write()
            .get_mut(table)
            .map(|rows| rows.remove(key).is_some())
            .unwrap_or(false);
        if existed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<ScanRow>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| {
                rows.range(prefix.to_vec()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn scan_all(&self, table: &str) -> Result<Vec<ScanRow>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn stats(&self) -> BackendStats {
        BackendStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            disk_size_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_prefix_is_ordered() {
        let backend = InMemoryBackend::new();
        backend.put("messages", b"ts:0003", b"c").unwrap();
        backend.put("messages", b"ts:0001", b"a").unwrap();
        backend.put("messages", b"ts:0002", b"b").unwrap();
        let rows = backend.scan_prefix("messages", b"ts:").unwrap();
        assert_eq!(rows.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn separate_tables_are_isolated() {
        let backend = InMemoryBackend::new();
        backend.put("messages", b"k", b"m").unwrap();
        backend.put("sessions", b"k", b"s").unwrap();
        assert_eq!(backend.get("messages", b"k").unwrap(), Some(b"m".to_vec()));
        assert_eq!(backend.get("sessions", b"k").unwrap(), Some(b"s".to_vec()));
    }
}
