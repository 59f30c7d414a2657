//! The workers metadata file: persisted on every membership change so
//! external CLIs can list live agents without an RPC (§4.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub agent_name: String,
    pub cli: String,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_of: Option<String>,
}

/// In-memory mirror of the on-disk workers file, kept consistent with the
/// spawner's live wrapper set.
pub struct WorkersFile {
    path: PathBuf,
    workers: RwLock<HashMap<String, WorkerRecord>>,
}

impl WorkersFile {
    /// Loads an existing file at `path`, or starts empty if none exists.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let workers = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            workers: RwLock::new(workers),
        })
    }

    pub fn upsert(&self, record: WorkerRecord) -> Result<()> {
        self.workers.write().insert(record.agent_name.clone(), record);
        self.persist()
    }

    pub fn remove(&self, agent_name: &str) -> Result<()> {
        self.workers.write().remove(agent_name);
        self.persist()
    }

    pub fn get(&self, agent_name: &str) -> Option<WorkerRecord> {
        self.workers.read().get(agent_name).cloned()
    }

    pub fn list(&self) -> Vec<WorkerRecord> {
        self.workers.read().values().cloned().collect()
    }

    /// Writes the current table to disk, via a same-directory temp file
    /// plus rename so readers never observe a partial write.
    fn persist(&self) -> Result<()> {
        let snapshot = self.workers.read().clone();
        write_atomic(&self.path, &serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workers.json");

        let file = WorkersFile::load(&path).unwrap();
        file.upsert(WorkerRecord {
            agent_name: "Dev".into(),
            cli: "claude".into(),
            started_at: 1_000,
            shadow_of: None,
        })
        .unwrap();

        let reloaded = WorkersFile::load(&path).unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.get("Dev").unwrap().cli, "claude");
    }

    #[test]
    fn remove_drops_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workers.json");
        let file = WorkersFile::load(&path).unwrap();
        file.upsert(WorkerRecord {
            agent_name: "Dev".into(),
            cli: "claude".into(),
            started_at: 1_000,
            shadow_of: None,
        })
        .unwrap();
        file.remove("Dev").unwrap();
        assert!(WorkersFile::load(&path).unwrap().list().is_empty());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        assert!(WorkersFile::load(&path).unwrap().list().is_empty());
    }
}
