use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Identifies the album page a set of persisted preferences belongs to.
pub type OriginId = Uuid;

static ORIGIN_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d6c2e-5b8a-5e41-9c07-a4d2e1b6f810").expect("valid namespace UUID")
});

pub fn origin_for_path(path: &Path) -> OriginId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&*ORIGIN_NAMESPACE, rendered.as_bytes())
}

/// Durable key/value storage scoped to one album origin. Each key has a
/// single owning component.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores every key of one origin in a single JSON object on disk.
pub struct FileLocalStore {
    path: PathBuf,
}

impl FileLocalStore {
    pub fn new(root: PathBuf, origin: OriginId) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create storage directory at {:?}", root))?;
        Ok(Self {
            path: root.join(format!("{}.json", origin)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open storage file {:?}", self.path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let entries = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode storage file {:?}", self.path))?;
        Ok(entries)
    }

    /// Entries to build the next write on, and whether the file on disk was
    /// unreadable. An unreadable file is replaced on the next write.
    fn entries_for_write(&self) -> (BTreeMap<String, String>, bool) {
        match self.read_all() {
            Ok(entries) => (entries, false),
            Err(err) => {
                warn!(?err, path = ?self.path, "discarding unreadable storage file");
                (BTreeMap::new(), true)
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(entries)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp storage file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let (mut entries, _) = self.entries_for_write();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let (mut entries, unreadable) = self.entries_for_write();
        if entries.remove(key).is_some() || unreadable {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Process-lifetime storage; doubles as session storage for the auth gate.
pub struct MemoryLocalStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.lock().remove(key);
        Ok(())
    }
}
