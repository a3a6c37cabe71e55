use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use fs2::FileExt;

use crate::{
    directory::{Directory, DirectoryLock},
    error::{Result, SearchError},
    utils::paths::get_temp_file_name,
};

/// Index files stored as plain files inside one folder.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

struct FileLockGuard {
    file: File,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FsDirectory {
    /// Opens `root`, creating the folder if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| SearchError::io(format!("creating index directory {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write_durable(path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    // Persists renames; not every platform can open a directory for syncing.
    fn sync_root(&self) {
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }
    }
}

impl Directory for FsDirectory {
    fn read(&self, name: &str) -> Result<Arc<[u8]>> {
        let bytes = fs::read(self.path(name)).map_err(|e| SearchError::io(format!("reading {}", name), e))?;
        Ok(Arc::from(bytes))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        Self::write_durable(&self.path(name), data).map_err(|e| SearchError::io(format!("writing {}", name), e))
    }

    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()> {
        let temp_name = get_temp_file_name(name);
        let temp_path = self.path(&temp_name);
        if let Err(e) = Self::write_durable(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(SearchError::io(format!("writing {}", temp_name), e));
        }
        if let Err(e) = fs::rename(&temp_path, self.path(name)) {
            let _ = fs::remove_file(&temp_path);
            return Err(SearchError::io(format!("renaming {} to {}", temp_name, name), e));
        }
        self.sync_root();
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        fs::remove_file(self.path(name)).map_err(|e| SearchError::io(format!("deleting {}", name), e))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        self.path(name)
            .try_exists()
            .map_err(|e| SearchError::io(format!("checking {}", name), e))
    }

    fn list(&self) -> Result<Vec<String>> {
        let context = || format!("listing {}", self.root.display());
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| SearchError::io(context(), e))? {
            let entry = entry.map_err(|e| SearchError::io(context(), e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn acquire_lock(&self, name: &str) -> Result<DirectoryLock> {
        let path = self.path(name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SearchError::io(format!("opening lock file {}", name), e))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(DirectoryLock::new(name, FileLockGuard { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(SearchError::LockHeld(path.display().to_string()))
            }
            Err(e) => Err(SearchError::io(format!("locking {}", name), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(dir.path().join("index")).unwrap();
        directory.write("seg_00000001.terms", b"abc").unwrap();
        directory.atomic_write("segments.json", b"{}").unwrap();

        assert_eq!(&*directory.read("seg_00000001.terms").unwrap(), b"abc");
        assert_eq!(directory.list().unwrap(), vec!["seg_00000001.terms", "segments.json"]);
        assert!(directory.exists("segments.json").unwrap());

        directory.delete("seg_00000001.terms").unwrap();
        let missing = directory.read("seg_00000001.terms").unwrap_err();
        assert!(missing.is_missing_file());
    }

    #[test]
    fn test_atomic_write_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(dir.path()).unwrap();
        directory.atomic_write("segments.json", b"one").unwrap();
        directory.atomic_write("segments.json", b"two").unwrap();
        assert_eq!(&*directory.read("segments.json").unwrap(), b"two");
        assert!(!directory.exists("segments.json.tmp").unwrap());
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(dir.path()).unwrap();
        let lock = directory.acquire_lock("write.lock").unwrap();
        assert_eq!(lock.name(), "write.lock");
        assert!(matches!(
            directory.acquire_lock("write.lock"),
            Err(SearchError::LockHeld(_))
        ));
        drop(lock);
        assert!(directory.acquire_lock("write.lock").is_ok());
    }
}
