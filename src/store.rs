//! Blob stores that hold delivered messages
//!
//! Keys are `/`-separated paths such as `email/abc123`. Stores are only ever
//! read: nothing here mutates or deletes stored objects.

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Object storage addressed by key
pub trait BlobStore: Send + Sync {
    /// Keys starting with `prefix`, in a stable order
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Raw bytes stored under `key`
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// In-process store, mostly for tests and demos
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.insert(key.into(), bytes.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(key, bytes);
        self
    }
}

impl BlobStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Store backed by a directory tree; a key is a file path relative to the root
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(StoreError::Backend(format!("invalid key: {key}")));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| StoreError::io(&path, e))?;

            if file_type.is_dir() {
                self.walk(&path, keys)?;
            } else if file_type.is_file()
                && let Ok(relative) = path.strip_prefix(&self.root)
            {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }

        Ok(())
    }
}

impl BlobStore for DirStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        self.walk(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        debug!(root = %self.root.display(), prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::io(path, e)
            }
        })
    }
}
