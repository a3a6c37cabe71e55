use std::{
    path::Path,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    config::IndexConfig,
    directory::{Directory, FsDirectory, RamDirectory},
    error::Result,
    index::{
        reader::IndexReader,
        writer::{IndexWriter, OpenMode},
    },
    segment::{Manifest, SegmentMeta, SegmentReader},
    utils::types::SegmentId,
};

/// Entry point of an index stored in a `Directory`. Cheap to clone; clones
/// share the directory and the cache of open segments.
#[derive(Debug, Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

#[derive(Debug)]
struct IndexInner {
    directory: Arc<dyn Directory>,
    config: IndexConfig,
    // segments stay cached for as long as some reader holds them
    segment_cache: Mutex<FxHashMap<SegmentId, Weak<SegmentReader>>>,
}

impl Index {
    pub fn open(directory: Arc<dyn Directory>, config: IndexConfig) -> Result<Index> {
        config.validate()?;
        Ok(Index {
            inner: Arc::new(IndexInner {
                directory,
                config,
                segment_cache: Mutex::new(FxHashMap::default()),
            }),
        })
    }

    /// An index stored in the folder `path`, created if missing.
    pub fn open_in_dir<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Index> {
        let directory = FsDirectory::open(path)?;
        Self::open(Arc::new(directory), config)
    }

    pub fn create_in_ram(config: IndexConfig) -> Result<Index> {
        Self::open(Arc::new(RamDirectory::new()), config)
    }

    pub fn directory(&self) -> &dyn Directory {
        self.inner.directory.as_ref()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    /// True once a manifest has been published.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.load_manifest()?.is_some())
    }

    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        Manifest::load(self.directory())
    }

    pub fn writer(&self, mode: OpenMode) -> Result<IndexWriter> {
        IndexWriter::open(self.clone(), mode)
    }

    /// A snapshot of the latest commit.
    pub fn reader(&self) -> Result<IndexReader> {
        IndexReader::open(self.clone())
    }

    /// Opens a segment or returns the instance already shared by other readers.
    pub fn segment_reader(&self, meta: &SegmentMeta) -> Result<Arc<SegmentReader>> {
        if let Some(reader) = self
            .inner
            .segment_cache
            .lock()
            .get(&meta.segment_id)
            .and_then(Weak::upgrade)
        {
            return Ok(reader);
        }
        let reader = Arc::new(SegmentReader::open(self.directory(), meta)?);
        let mut cache = self.inner.segment_cache.lock();
        cache.retain(|_, cached| cached.strong_count() > 0);
        let reader = match cache.get(&meta.segment_id).and_then(Weak::upgrade) {
            // another thread opened it meanwhile
            Some(existing) => existing,
            None => {
                cache.insert(meta.segment_id, Arc::downgrade(&reader));
                reader
            }
        };
        Ok(reader)
    }
}
