//! The on-disk overflow directory a batch is written to when every retry
//! has been exhausted (§4.7 steps 4-5, "Recovery").

use std::path::PathBuf;

use relay_types::Envelope;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SpillStore {
    dir: PathBuf,
    cap: usize,
}

impl SpillStore {
    pub fn new(dir: impl Into<PathBuf>, cap: usize) -> Self {
        Self { dir: dir.into(), cap }
    }

    /// Writes `batch` as `spill-<ms>-<8hex>.json`, UUID-suffixed so
    /// concurrent spills under high rate never collide on name.
    pub fn write_batch(&self, batch: &[Envelope]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let name = format!(
            "spill-{}-{}.json",
            now_ms(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.dir.join(name);
        let contents = serde_json::to_vec(batch)?;
        std::fs::write(path, contents)?;
        self.enforce_cap();
        Ok(())
    }

    /// Deletes the oldest spill files until at most `cap` remain. Spill
    /// filenames embed a millisecond timestamp prefix, so lexicographic
    /// order is age order.
    pub fn enforce_cap(&self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        while files.len() > self.cap {
            let oldest = files.remove(0);
            if let Err(err) = std::fs::remove_file(&oldest) {
                warn!(path = %oldest.display(), %err, "failed to evict spill file over cap");
            }
        }
    }

    /// Lists spilled files in age order, oldest first.
    pub fn list(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        files
    }

    /// Reads one spill file's batch without removing it.
    pub fn read(&self, path: &PathBuf) -> Result<Vec<Envelope>> {
        let contents = std::fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// Removes a spill file after it has been successfully replayed.
    pub fn remove(&self, path: &PathBuf) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }
}

fn now_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::EnvelopeKind;

    #[test]
    fn write_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let spill = SpillStore::new(dir.path(), 100);
        let batch = vec![Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap()];
        spill.write_batch(&batch).unwrap();

        let files = spill.list();
        assert_eq!(files.len(), 1);
        let read_back = spill.read(&files[0]).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].body, "hi");
    }

    #[test]
    fn enforce_cap_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let spill = SpillStore::new(dir.path(), 2);
        for i in 0..5 {
            let batch = vec![Envelope::new("Lead", "Dev", EnvelopeKind::Message, format!("msg{i}")).unwrap()];
            spill.write_batch(&batch).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(spill.list().len(), 2);
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let spill = SpillStore::new(dir.path(), 100);
        let batch = vec![Envelope::new("Lead", "Dev", EnvelopeKind::Message, "hi").unwrap()];
        spill.write_batch(&batch).unwrap();
        let files = spill.list();
        spill.remove(&files[0]).unwrap();
        assert!(spill.list().is_empty());
    }
}
