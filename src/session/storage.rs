use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::errors::StorageError;

/// One mutation inside a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set(String, String),
    Remove(String),
}

/// Durable key/value storage scoped to one user.
///
/// `write` applies the whole batch or nothing; a concurrent `get` observes
/// either the state before the batch or the state after it.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, batch: &[StorageOp]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(&[StorageOp::Set(key.to_string(), value.to_string())])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write(&[StorageOp::Remove(key.to_string())])
    }
}

fn apply(map: &mut HashMap<String, String>, batch: &[StorageOp]) {
    for op in batch {
        match op {
            StorageOp::Set(key, value) => {
                map.insert(key.clone(), value.clone());
            }
            StorageOp::Remove(key) => {
                map.remove(key);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, batch: &[StorageOp]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        apply(&mut entries, batch);
        Ok(())
    }
}

/// Storage backed by a single JSON object on disk.
///
/// Every batch rewrites the file through a temporary sibling and a rename,
/// so the file always holds a complete snapshot.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Opens the storage file in the local data directory.
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, batch: &[StorageOp]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = entries.clone();
        apply(&mut next, batch);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}
