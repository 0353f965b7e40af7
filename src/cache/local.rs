//! Filesystem-backed cache
//!
//! One file per `(group, name)` under the namespace root.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::{Result, XconfError};
use crate::keys::PRODUCT_NAME;

/// Read-through, write-back byte store keyed by `(group, name)`
pub struct LocalCache {
    /// `{cache_dir}/xconf/{namespace}`
    root: PathBuf,

    /// Per-entry write locks, held only while an operation is in flight
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LocalCache {
    /// Create a cache for `namespace` under `cache_dir`. Nothing is created
    /// on disk until the first write.
    pub fn new(cache_dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            root: cache_dir.as_ref().join(PRODUCT_NAME).join(namespace),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Read an entry. A missing entry is `CacheMiss`.
    pub fn read(&self, group: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(group, name)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(XconfError::CacheMiss),
            Err(e) => Err(XconfError::Cache(format!("read {}: {}", path.display(), e))),
        }
    }

    /// Replace an entry, creating directories as needed
    pub fn write(&self, group: &str, name: &str, content: &[u8]) -> Result<()> {
        let path = self.entry_path(group, name)?;
        let dir = path
            .parent()
            .ok_or_else(|| XconfError::Cache(format!("no parent for {}", path.display())))?;

        self.with_entry_lock(&path, || {
            fs::create_dir_all(dir)
                .map_err(|e| XconfError::Cache(format!("create {}: {}", dir.display(), e)))?;

            let mut tmp = NamedTempFile::new_in(dir)
                .map_err(|e| XconfError::Cache(format!("temp file in {}: {}", dir.display(), e)))?;
            tmp.write_all(content)
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|e| XconfError::Cache(format!("write {}: {}", path.display(), e)))?;
            tmp.persist(&path).map_err(|e| {
                XconfError::Cache(format!("rename into {}: {}", path.display(), e.error))
            })?;

            tracing::trace!("Cached {} bytes at {}", content.len(), path.display());
            Ok(())
        })
    }

    /// Remove an entry. Removing a missing entry is not an error.
    pub fn remove(&self, group: &str, name: &str) -> Result<()> {
        let path = self.entry_path(group, name)?;
        self.with_entry_lock(&path, || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(XconfError::Cache(format!("remove {}: {}", path.display(), e))),
        })
    }

    /// Number of entries with an operation in flight
    pub fn locked_entries(&self) -> usize {
        self.locks.lock().len()
    }

    /// Namespace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `(group, name)`.
    ///
    /// Both parts must be relative and may not escape the namespace root.
    /// A group may contain `/` to nest directories.
    pub fn entry_path(&self, group: &str, name: &str) -> Result<PathBuf> {
        check_relative(group, "group")?;
        check_relative(name, "name")?;
        Ok(self.root.join(group).join(name))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run `op` holding the lock for `path`. The lock is dropped from the map
    /// once no other operation holds a reference to it.
    fn with_entry_lock<R>(&self, path: &Path, op: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };

        let result = {
            let _guard = lock.lock();
            op()
        };
        drop(lock);

        // Clones are only taken under the map lock, so a count of one here
        // means nobody else is using or waiting on this entry
        let mut locks = self.locks.lock();
        if locks.get(path).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(path);
        }
        result
    }
}

fn check_relative(part: &str, what: &str) -> Result<()> {
    if part.is_empty() {
        return Err(XconfError::Cache(format!("empty {}", what)));
    }
    let path = Path::new(part);
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok || part.contains('\0') {
        return Err(XconfError::Cache(format!("invalid {}: {:?}", what, part)));
    }
    Ok(())
}
