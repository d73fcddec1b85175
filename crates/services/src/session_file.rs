//! File-backed session store.
//!
//! Keeps the whole map in memory and rewrites one JSON file on every
//! change, so panel state survives an app restart.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared::session_store::SessionStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileSessionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    /// Open (or start) the session file at `path`. A corrupt file is
    /// logged and treated as an empty session.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "discarding unreadable session file: {}", e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Forget the whole session, like closing the browser tab.
    pub fn reset(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.flush(&entries);
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        let result = serde_json::to_vec_pretty(entries)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| fs::write(&self.path, bytes).map_err(anyhow::Error::from));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), "failed to write session file: {}", e);
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}
