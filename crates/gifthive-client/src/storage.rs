use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::warn;

/// Browser-style local storage: string keys to string values. Writes are
/// fire-and-forget, so implementations log their own failures.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// In-memory storage; lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStorage {
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        match self.entries.lock() {
            Ok(mut entries) => f(&mut entries),
            Err(e) => warn!("Storage lock poisoned, dropping write: {}", e),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.lock() {
            Ok(entries) => entries.get(key).cloned(),
            Err(e) => {
                warn!("Storage lock poisoned: {}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }

    fn clear(&self) {
        self.update(HashMap::clear);
    }
}

/// Storage persisted as a JSON object in one file, so a session survives
/// restarts the way browser local storage survives page loads.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Load existing entries from `path`. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt storage file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Storage lock poisoned, dropping write to {}", self.path.display());
            return;
        };
        f(&mut entries);

        let written = serde_json::to_string(&*entries)
            .map_err(anyhow::Error::from)
            .and_then(|raw| std::fs::write(&self.path, raw).map_err(anyhow::Error::from));
        if let Err(e) = written {
            warn!("Failed to persist storage to {}: {}", self.path.display(), e);
        }
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }

    fn clear(&self) {
        self.update(HashMap::clear);
    }
}
