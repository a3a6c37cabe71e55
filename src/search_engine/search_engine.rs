use std::path::Path;

use tracing::info;

use crate::{
    config::IndexConfig,
    document::passage::{PassageCollection, read_passage_collections},
    error::Result,
    index::{Index, IndexReader, IndexWriter, OpenMode, SearchResults},
    utils::types::SegmentId,
};

/// Summary of the committed index, as shown by the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub generation: u64,
    pub no_of_segments: usize,
    pub no_of_docs: u64,
    pub no_of_deleted_docs: u64,
    pub no_of_fields: usize,
    pub size_of_index: u64,
}

/// Ties an index, its lazily opened writer and a reader that is refreshed
/// after every change made through this engine.
pub struct SearchEngine {
    index: Index,
    writer: Option<IndexWriter>,
    reader: Option<IndexReader>,
    default_fields: Vec<String>,
}

impl SearchEngine {
    pub fn new(index: Index, default_fields: Vec<String>) -> Self {
        Self {
            index,
            writer: None,
            reader: None,
            default_fields,
        }
    }

    pub fn open_in_dir<P: AsRef<Path>>(path: P, config: IndexConfig, default_fields: Vec<String>) -> Result<Self> {
        Ok(Self::new(Index::open_in_dir(path, config)?, default_fields))
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn default_fields(&self) -> &[String] {
        &self.default_fields
    }

    fn writer(&mut self) -> Result<&mut IndexWriter> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.index.writer(OpenMode::CreateOrAppend)?,
        };
        Ok(self.writer.insert(writer))
    }

    // A reader for the latest commit, reopened only when the generation moved.
    fn reader(&mut self) -> Result<&IndexReader> {
        let latest_generation = match self.index.load_manifest()? {
            Some(manifest) => manifest.generation,
            None => {
                self.writer()?;
                0
            }
        };
        let reader = match self.reader.take() {
            Some(reader) if reader.generation() == latest_generation => reader,
            Some(reader) => reader.reload()?,
            None => self.index.reader()?,
        };
        Ok(self.reader.insert(reader))
    }

    /// Adds every passage and query document of `collections` and commits.
    pub fn index_collections(&mut self, collections: &[PassageCollection]) -> Result<u64> {
        let writer = self.writer()?;
        let mut added = 0u64;
        for collection in collections {
            for document in collection.documents() {
                writer.add_document(document)?;
                added += 1;
            }
        }
        writer.commit()?;
        info!(collections = collections.len(), documents = added, "indexed passage collections");
        Ok(added)
    }

    /// Reads a passage collection file (plain or `.bz2`) and indexes it.
    pub fn index_file<P: AsRef<Path>>(&mut self, path: P) -> Result<u64> {
        let collections = read_passage_collections(path)?;
        self.index_collections(&collections)
    }

    pub fn commit(&mut self) -> Result<Option<SegmentId>> {
        self.writer()?.commit()
    }

    pub fn merge(&mut self) -> Result<Option<SegmentId>> {
        self.writer()?.force_merge()
    }

    pub fn handle_query(&mut self, query: &str, top_k: usize) -> Result<SearchResults> {
        let default_fields: Vec<String> = self.default_fields.clone();
        let fields: Vec<&str> = default_fields.iter().map(String::as_str).collect();
        self.reader()?.searcher().search(query, &fields, top_k)
    }

    pub fn get_index_metadata(&mut self) -> Result<IndexMetadata> {
        let directory = self.index.directory();
        let mut size_of_index = 0u64;
        for file in directory.list()? {
            if let Ok(bytes) = directory.read(&file) {
                size_of_index += bytes.len() as u64;
            }
        }
        let reader = self.reader()?;
        Ok(IndexMetadata {
            generation: reader.generation(),
            no_of_segments: reader.segment_count(),
            no_of_docs: reader.num_docs(),
            no_of_deleted_docs: reader.max_doc() - reader.num_docs(),
            no_of_fields: reader.schema().len(),
            size_of_index,
        })
    }

    /// Commits anything pending and releases the write lock.
    pub fn close(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}
