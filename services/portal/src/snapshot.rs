//! Optional on-disk snapshots for the in-memory stores
//!
//! When a snapshot directory is configured, every store serializes its
//! map to a JSON file on mutation and reloads it on startup. Snapshots
//! are strictly best-effort: a read or write failure is logged and the
//! store keeps running on memory alone.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// Best-effort JSON snapshot of a single store
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    /// Create a snapshot handle under the given directory
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    /// Load the snapshot, returning an empty map when the file is
    /// missing or unreadable
    pub fn load<V: DeserializeOwned>(&self) -> HashMap<String, V> {
        match fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, V>>(&data) {
                Ok(entries) => {
                    info!("Loaded {} entries from {}", entries.len(), self.path.display());
                    entries
                }
                Err(err) => {
                    warn!("Ignoring corrupt snapshot {}: {}", self.path.display(), err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    /// Persist the current entries, logging failures only
    pub fn persist<V: Serialize>(&self, entries: &HashMap<String, V>) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("Could not create snapshot directory: {}", err);
                return;
            }
        }

        match serde_json::to_string_pretty(entries) {
            Ok(data) => {
                if let Err(err) = fs::write(&self.path, data) {
                    warn!("Failed to write snapshot {}: {}", self.path.display(), err);
                }
            }
            Err(err) => warn!("Failed to serialize snapshot: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        value: u32,
    }

    #[test]
    fn round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path(), "entries.json");

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), Entry { value: 1 });
        snapshot.persist(&entries);

        let loaded: HashMap<String, Entry> = snapshot.load();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path(), "missing.json");
        let loaded: HashMap<String, Entry> = snapshot.load();
        assert!(loaded.is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();
        let snapshot = Snapshot::new(dir.path(), "bad.json");
        let loaded: HashMap<String, Entry> = snapshot.load();
        assert!(loaded.is_empty());
    }
}
