//! Cloud sync counters (§4.7: "on HTTP success update stats (`synced`,
//! `duplicates`, `bytes_transferred`)").

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SyncStats {
    synced: AtomicU64,
    duplicates: AtomicU64,
    bytes_transferred: AtomicU64,
    spilled: AtomicU64,
    recovered: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncStatsSnapshot {
    pub synced: u64,
    pub duplicates: u64,
    pub bytes_transferred: u64,
    pub spilled: u64,
    pub recovered: u64,
}

impl SyncStats {
    pub fn record_synced(&self, count: u64, bytes: u64, duplicates: u64) {
        self.synced.fetch_add(count, Ordering::Relaxed);
        self.duplicates.fetch_add(duplicates, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_spilled(&self, count: u64) {
        self.spilled.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_recovered(&self, count: u64) {
        self.recovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            synced: self.synced.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            spilled: self.spilled.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate() {
        let stats = SyncStats::default();
        stats.record_synced(10, 2048, 1);
        stats.record_synced(5, 1024, 0);
        stats.record_spilled(3);

        let snap = stats.snapshot();
        assert_eq!(snap.synced, 15);
        assert_eq!(snap.duplicates, 1);
        assert_eq!(snap.bytes_transferred, 3072);
        assert_eq!(snap.spilled, 3);
    }
}
