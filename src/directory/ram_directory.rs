use std::{
    io,
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    directory::{Directory, DirectoryLock},
    error::{Result, SearchError},
};

/// In-memory directory. Clones share the same files and lock table.
#[derive(Debug, Clone, Default)]
pub struct RamDirectory {
    inner: Arc<RamDirectoryInner>,
}

#[derive(Debug, Default)]
struct RamDirectoryInner {
    files: RwLock<FxHashMap<String, Arc<[u8]>>>,
    locks: Mutex<FxHashSet<String>>,
}

struct RamLockGuard {
    inner: Arc<RamDirectoryInner>,
    name: String,
}

impl Drop for RamLockGuard {
    fn drop(&mut self) {
        self.inner.locks.lock().remove(&self.name);
    }
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes held by all files.
    pub fn total_bytes(&self) -> usize {
        self.inner.files.read().values().map(|data| data.len()).sum()
    }
}

impl Directory for RamDirectory {
    fn read(&self, name: &str) -> Result<Arc<[u8]>> {
        self.inner.files.read().get(name).cloned().ok_or_else(|| {
            SearchError::io(format!("reading {}", name), io::Error::from(io::ErrorKind::NotFound))
        })
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.inner.files.write().insert(name.to_string(), Arc::from(data));
        Ok(())
    }

    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.write(name, data)
    }

    fn delete(&self, name: &str) -> Result<()> {
        match self.inner.files.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(SearchError::io(
                format!("deleting {}", name),
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.files.read().contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.inner.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn acquire_lock(&self, name: &str) -> Result<DirectoryLock> {
        if !self.inner.locks.lock().insert(name.to_string()) {
            return Err(SearchError::LockHeld(name.to_string()));
        }
        Ok(DirectoryLock::new(
            name,
            RamLockGuard {
                inner: self.inner.clone(),
                name: name.to_string(),
            },
        ))
    }
}
