//! Storage abstraction under an index. Every index file is written once and
//! never modified; the only file that is ever replaced is the manifest, and it
//! is replaced through `atomic_write`.

pub mod fs_directory;
pub mod ram_directory;

use std::{any::Any, fmt, sync::Arc};

use crate::error::Result;

pub use fs_directory::FsDirectory;
pub use ram_directory::RamDirectory;

pub trait Directory: Send + Sync + fmt::Debug {
    /// Whole file contents. A missing file is reported as an `Io` error of kind
    /// `NotFound`.
    fn read(&self, name: &str) -> Result<Arc<[u8]>>;

    /// Creates (or truncates) `name` and makes its contents durable before
    /// returning.
    fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Replaces `name` so that readers observe either the old or the new
    /// contents, never a mix.
    fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()>;

    fn delete(&self, name: &str) -> Result<()>;

    fn exists(&self, name: &str) -> Result<bool>;

    fn list(&self) -> Result<Vec<String>>;

    /// Takes the exclusive lock `name`, failing with `LockHeld` when someone
    /// else owns it. The lock is released when the guard is dropped.
    fn acquire_lock(&self, name: &str) -> Result<DirectoryLock>;
}

/// Held lock; releases on drop.
pub struct DirectoryLock {
    name: String,
    _guard: Box<dyn Any + Send + Sync>,
}

impl DirectoryLock {
    pub fn new(name: impl Into<String>, guard: impl Any + Send + Sync) -> Self {
        Self {
            name: name.into(),
            _guard: Box::new(guard),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DirectoryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryLock").field("name", &self.name).finish()
    }
}
