//! File-backed credential storage.
//!
//! A durable, synchronous key-value map persisted as pretty JSON. Writes go
//! through a temp file and rename so a partially written credentials file is
//! never observable after a crash.

use crate::{CredentialStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// JSON-file storage at a fixed path (typically `~/.zo-console/credentials.json`).
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!(
                    "credentials file {} is not valid JSON: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The path this storage persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Persisted credential store");
        Ok(())
    }
}

impl CredentialStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }
}
