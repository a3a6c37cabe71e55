use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    analysis::AnalyzerRegistry,
    directory::DirectoryLock,
    document::Document,
    error::{Result, SearchError},
    index::index::Index,
    postings::Term,
    segment::{
        Manifest, SegmentMeta,
        buffer::SegmentBuffer,
        deletes::DeleteSet,
        merger::{MergeSource, merge_segments},
        segment_reader::load_deletes,
        segment_writer::write_buffer,
    },
    utils::{
        paths::{SegmentComponent, WRITE_LOCK_FILE, get_deletes_file_name, get_segment_file_name, is_index_file},
        types::{DocId, DocumentId, SegmentId},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start an empty index, discarding whatever was committed before.
    Create,
    /// Continue an existing index; fails with `NotFound` if there is none.
    Append,
    CreateOrAppend,
}

#[derive(Debug, Clone)]
struct PendingDelete {
    term: Term,
    // buffered documents below this id were added before the delete
    buffered_limit: DocId,
}

/// The single writer of an index. Holds the directory's write lock for its
/// whole lifetime; dropping it releases the lock and discards anything not
/// committed.
pub struct IndexWriter {
    index: Index,
    manifest: Manifest,
    analyzers: AnalyzerRegistry,
    buffer: SegmentBuffer,
    pending_deletes: Vec<PendingDelete>,
    lock: DirectoryLock,
}

impl fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexWriter")
            .field("generation", &self.manifest.generation)
            .field("segments", &self.manifest.segments.len())
            .field("buffered_docs", &self.buffer.num_docs())
            .field("pending_deletes", &self.pending_deletes.len())
            .field("lock", &self.lock)
            .finish()
    }
}

impl IndexWriter {
    pub fn open(index: Index, mode: OpenMode) -> Result<IndexWriter> {
        let lock = index.directory().acquire_lock(WRITE_LOCK_FILE)?;
        let existing = index.load_manifest()?;
        let manifest = match (mode, existing) {
            (OpenMode::Append | OpenMode::CreateOrAppend, Some(manifest)) => manifest,
            (OpenMode::Append, None) => {
                return Err(SearchError::NotFound("no index to append to".to_string()));
            }
            (OpenMode::Create | OpenMode::CreateOrAppend, existing) => {
                let mut manifest = Manifest::new(index.config().analyzers.clone());
                if let Some(previous) = existing {
                    // segment ids are never reused within one directory
                    manifest.generation = previous.generation + 1;
                    manifest.next_segment_id = previous.next_segment_id;
                }
                manifest.save(index.directory())?;
                info!(generation = manifest.generation, "created empty index");
                manifest
            }
        };

        let writer = IndexWriter {
            analyzers: AnalyzerRegistry::new(manifest.analyzers.clone()),
            buffer: SegmentBuffer::new(index.config().position_increment_gap),
            pending_deletes: Vec::new(),
            index,
            manifest,
            lock,
        };
        writer.collect_garbage();
        info!(
            generation = writer.manifest.generation,
            segments = writer.manifest.segments.len(),
            docs = writer.manifest.num_docs(),
            "opened index writer"
        );
        Ok(writer)
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// The last committed manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn num_buffered_docs(&self) -> u32 {
        self.buffer.num_docs()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.buffer.is_empty() || !self.pending_deletes.is_empty()
    }

    /// Buffers `document`. The returned id is its local doc id inside the
    /// segment produced by the next commit. A failed automatic commit is only
    /// logged: the document stays buffered and the next commit retries it.
    pub fn add_document(&mut self, document: Document) -> Result<DocumentId> {
        let document_id = self
            .buffer
            .add_document(document, &self.analyzers, &self.manifest.schema)?;
        self.maybe_auto_commit();
        Ok(document_id)
    }

    /// Deletes every document containing `term`: committed ones and the ones
    /// buffered so far. Takes effect at the next commit.
    pub fn delete_term(&mut self, term: Term) {
        self.pending_deletes.push(PendingDelete {
            term,
            buffered_limit: self.buffer.num_docs(),
        });
    }

    pub fn update_document(&mut self, term: Term, document: Document) -> Result<DocumentId> {
        self.delete_term(term);
        self.add_document(document)
    }

    fn maybe_auto_commit(&mut self) {
        let config = self.index.config();
        let docs_exceeded = config
            .max_buffered_docs
            .is_some_and(|max| self.buffer.num_docs() as usize >= max);
        let bytes_exceeded = config
            .max_buffered_bytes
            .is_some_and(|max| self.buffer.estimated_bytes() >= max);
        if docs_exceeded || bytes_exceeded {
            warn!(
                buffered_docs = self.buffer.num_docs(),
                estimated_bytes = self.buffer.estimated_bytes(),
                "write buffer full, committing"
            );
            if let Err(e) = self.commit() {
                warn!(
                    error = %e,
                    buffered_docs = self.buffer.num_docs(),
                    "automatic commit failed, keeping buffered documents"
                );
            }
        }
    }

    /// Writes buffered documents into a new segment, applies pending deletes
    /// and publishes a new manifest. On error nothing becomes visible and the
    /// buffer is kept so the commit can be retried.
    pub fn commit(&mut self) -> Result<Option<SegmentId>> {
        let mut manifest = self.manifest.clone();
        manifest.generation += 1;
        let mut written_files = Vec::new();

        let result = self
            .prepare_commit(&mut manifest, &mut written_files)
            .and_then(|segment_id| manifest.save(self.index.directory()).map(|()| segment_id));
        let segment_id = match result {
            Ok(segment_id) => segment_id,
            Err(e) => {
                self.remove_files(&written_files);
                warn!(error = %e, generation = manifest.generation, "commit failed");
                return Err(e);
            }
        };

        info!(
            generation = manifest.generation,
            segment = ?segment_id.map(|id| id.to_string()),
            docs = self.buffer.num_docs(),
            deletes = self.pending_deletes.len(),
            "committed"
        );
        self.manifest = manifest;
        self.buffer.clear();
        self.pending_deletes.clear();
        self.collect_garbage();
        Ok(segment_id)
    }

    fn prepare_commit(&self, manifest: &mut Manifest, written_files: &mut Vec<String>) -> Result<Option<SegmentId>> {
        let directory = self.index.directory();
        let generation = manifest.generation;

        self.apply_pending_deletes(manifest, generation, written_files)?;

        let mut new_segment = None;
        if !self.buffer.is_empty() {
            let segment_id = manifest.allocate_segment_id();
            written_files.extend(
                SegmentComponent::ALL
                    .iter()
                    .map(|&component| get_segment_file_name(segment_id, component)),
            );
            let mut meta = write_buffer(directory, segment_id, &self.buffer, self.index.config())?;

            let mut deletes = DeleteSet::new(meta.max_doc);
            for pending in &self.pending_deletes {
                for doc_id in self.buffer.doc_ids_containing(&pending.term, pending.buffered_limit) {
                    deletes.delete(doc_id);
                }
            }
            if !deletes.is_empty() {
                self.write_deletes(&mut meta, &deletes, generation, written_files)?;
            }
            manifest.segments.push(meta);
            new_segment = Some(segment_id);
        }

        let before = manifest.segments.len();
        manifest.segments.retain(|meta| meta.num_docs() > 0);
        if manifest.segments.len() != before {
            debug!(dropped = before - manifest.segments.len(), "dropped fully deleted segments");
        }
        if new_segment.is_some_and(|id| manifest.segment(id).is_none()) {
            new_segment = None;
        }
        manifest
            .schema
            .extend(self.buffer.schema().iter().map(|(field, kind)| (field.clone(), *kind)));
        Ok(new_segment)
    }

    // Marks committed documents matching a pending delete term, writing a new
    // deletion generation for every segment that changed.
    fn apply_pending_deletes(
        &self,
        manifest: &mut Manifest,
        generation: u64,
        written_files: &mut Vec<String>,
    ) -> Result<()> {
        if self.pending_deletes.is_empty() {
            return Ok(());
        }
        let directory = self.index.directory();
        for meta in manifest.segments.iter_mut() {
            let mut deletes = match load_deletes(directory, meta)? {
                Some(deletes) => deletes.as_ref().clone(),
                None => DeleteSet::new(meta.max_doc),
            };
            let reader = self.index.segment_reader(meta)?;
            let mut changed = false;
            for pending in &self.pending_deletes {
                for posting in reader.postings(&pending.term) {
                    changed |= deletes.delete(posting.doc_id);
                }
            }
            if changed {
                self.write_deletes(meta, &deletes, generation, written_files)?;
            }
        }
        Ok(())
    }

    fn write_deletes(
        &self,
        meta: &mut SegmentMeta,
        deletes: &DeleteSet,
        generation: u64,
        written_files: &mut Vec<String>,
    ) -> Result<()> {
        let file_name = get_deletes_file_name(meta.segment_id, generation);
        written_files.push(file_name.clone());
        self.index.directory().write(&file_name, &deletes.encode())?;
        meta.delete_generation = Some(generation);
        meta.deleted_docs = deletes.count();
        Ok(())
    }

    /// Discards buffered documents and pending deletes.
    pub fn rollback(&mut self) {
        info!(
            docs = self.buffer.num_docs(),
            deletes = self.pending_deletes.len(),
            "rolled back"
        );
        self.buffer.clear();
        self.pending_deletes.clear();
    }

    /// Commits, then rewrites all live documents into a single segment.
    pub fn force_merge(&mut self) -> Result<Option<SegmentId>> {
        self.commit()?;
        if let [single] = self.manifest.segments.as_slice() {
            if single.deleted_docs == 0 {
                return Ok(Some(single.segment_id));
            }
        }
        if self.manifest.segments.is_empty() {
            return Ok(None);
        }

        let directory = self.index.directory();
        let mut sources = Vec::with_capacity(self.manifest.segments.len());
        for meta in &self.manifest.segments {
            sources.push(MergeSource {
                reader: self.index.segment_reader(meta)?,
                deletes: load_deletes(directory, meta)?,
            });
        }

        let mut manifest = self.manifest.clone();
        manifest.generation += 1;
        let segment_id = manifest.allocate_segment_id();
        let written_files: Vec<String> = SegmentComponent::ALL
            .iter()
            .map(|&component| get_segment_file_name(segment_id, component))
            .collect();
        let result = merge_segments(directory, &sources, segment_id, self.index.config()).and_then(|meta| {
            manifest.segments = meta.into_iter().collect();
            manifest.save(directory)
        });
        if let Err(e) = result {
            self.remove_files(&written_files);
            warn!(error = %e, "merge failed");
            return Err(e);
        }

        info!(
            generation = manifest.generation,
            merged = sources.len(),
            docs = manifest.num_docs(),
            "force merge finished"
        );
        let merged = manifest.segments.first().map(|meta| meta.segment_id);
        self.manifest = manifest;
        drop(sources);
        self.collect_garbage();
        Ok(merged)
    }

    /// Commits pending changes and releases the write lock.
    pub fn close(mut self) -> Result<()> {
        if self.has_pending_changes() {
            self.commit()?;
        }
        info!(generation = self.manifest.generation, "closed index writer");
        Ok(())
    }

    fn remove_files(&self, files: &[String]) {
        let directory = self.index.directory();
        for file in files {
            match directory.delete(file) {
                Ok(()) => {}
                Err(e) if e.is_missing_file() => {}
                Err(e) => warn!(file = %file, error = %e, "could not remove file"),
            }
        }
    }

    // Removes segment and temp files no longer named by the current manifest.
    fn collect_garbage(&self) {
        let directory = self.index.directory();
        let files = match directory.list() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "could not list index files");
                return;
            }
        };
        let referenced = self.manifest.referenced_files();
        let unreferenced: Vec<String> = files
            .into_iter()
            .filter(|file| is_index_file(file) && !referenced.contains(file))
            .collect();
        if !unreferenced.is_empty() {
            debug!(files = unreferenced.len(), "removing unreferenced files");
            self.remove_files(&unreferenced);
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.has_pending_changes() {
            debug!(
                docs = self.buffer.num_docs(),
                deletes = self.pending_deletes.len(),
                "dropping writer with uncommitted changes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{
        config::IndexConfig,
        directory::{Directory, DirectoryLock, RamDirectory},
    };

    fn passage(id: &str, text: &str) -> Document {
        Document::builder()
            .token("passage_ID", id)
            .text("passage_text", text)
            .build()
    }

    fn live_ids(index: &Index) -> Vec<String> {
        let reader = index.reader().unwrap();
        let mut ids = Vec::new();
        for entry in reader.segments() {
            for doc_id in 0..entry.meta.max_doc {
                if !entry.is_deleted(doc_id) {
                    let document = entry.reader.document(doc_id).unwrap();
                    ids.push(document.get("passage_ID").unwrap().to_string());
                }
            }
        }
        ids.sort();
        ids
    }

    #[test]
    fn test_second_writer_is_rejected() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let writer = index.writer(OpenMode::Create).unwrap();
        assert!(matches!(index.writer(OpenMode::Append), Err(SearchError::LockHeld(_))));
        drop(writer);
        assert!(index.writer(OpenMode::Append).is_ok());
    }

    #[test]
    fn test_append_requires_existing_index() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        assert!(matches!(index.writer(OpenMode::Append), Err(SearchError::NotFound(_))));
        assert!(index.writer(OpenMode::CreateOrAppend).is_ok());
        assert!(index.exists().unwrap());
    }

    #[test]
    fn test_buffered_documents_are_invisible_until_commit() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "alpha")).unwrap();
        assert_eq!(writer.num_buffered_docs(), 1);
        assert_eq!(index.reader().unwrap().num_docs(), 0);
        let segment_id = writer.commit().unwrap();
        assert!(segment_id.is_some());
        assert_eq!(writer.num_buffered_docs(), 0);
        assert_eq!(live_ids(&index), vec!["0"]);
    }

    #[test]
    fn test_delete_and_update() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "alpha")).unwrap();
        writer.add_document(passage("1", "beta")).unwrap();
        writer.commit().unwrap();

        writer
            .update_document(Term::new("passage_ID", "1"), passage("1", "beta updated"))
            .unwrap();
        writer.delete_term(Term::new("passage_ID", "0"));
        writer.commit().unwrap();

        assert_eq!(live_ids(&index), vec!["1"]);
        let reader = index.reader().unwrap();
        let hits: Vec<_> = reader
            .term_postings(&Term::new("passage_text", "updated"))
            .collect();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_delete_applies_only_to_earlier_buffered_documents() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "first")).unwrap();
        writer.delete_term(Term::new("passage_ID", "0"));
        writer.add_document(passage("0", "second")).unwrap();
        writer.commit().unwrap();

        let reader = index.reader().unwrap();
        assert_eq!(reader.num_docs(), 1);
        assert_eq!(reader.doc_freq(&Term::new("passage_text", "second")), 1);
        let live: Vec<_> = reader
            .term_postings(&Term::new("passage_text", "second"))
            .collect();
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_fully_deleted_segments_are_dropped() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "gone")).unwrap();
        writer.commit().unwrap();
        writer.delete_term(Term::new("passage_text", "gone"));
        writer.commit().unwrap();
        assert!(writer.manifest().segments.is_empty());
        assert_eq!(index.reader().unwrap().segment_count(), 0);
    }

    #[test]
    fn test_rollback_discards_buffer() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "alpha")).unwrap();
        writer.delete_term(Term::new("passage_ID", "x"));
        writer.rollback();
        assert!(!writer.has_pending_changes());
        assert_eq!(writer.commit().unwrap(), None);
        assert_eq!(index.reader().unwrap().num_docs(), 0);
    }

    #[test]
    fn test_auto_commit_on_full_buffer() {
        let config = IndexConfig {
            max_buffered_docs: Some(2),
            ..IndexConfig::default()
        };
        let index = Index::create_in_ram(config).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        for i in 0..5 {
            writer.add_document(passage(&i.to_string(), "auto")).unwrap();
        }
        assert_eq!(writer.num_buffered_docs(), 1);
        assert_eq!(index.reader().unwrap().num_docs(), 4);
        assert_eq!(writer.manifest().segments.len(), 2);
    }

    /// Fails every segment file write while `fail_writes` is set.
    #[derive(Debug, Default)]
    struct FlakyDirectory {
        inner: RamDirectory,
        fail_writes: AtomicBool,
    }

    impl Directory for FlakyDirectory {
        fn read(&self, name: &str) -> Result<Arc<[u8]>> {
            self.inner.read(name)
        }

        fn write(&self, name: &str, data: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SearchError::io(
                    format!("writing {}", name),
                    std::io::Error::other("no space left on device"),
                ));
            }
            self.inner.write(name, data)
        }

        fn atomic_write(&self, name: &str, data: &[u8]) -> Result<()> {
            self.inner.atomic_write(name, data)
        }

        fn delete(&self, name: &str) -> Result<()> {
            self.inner.delete(name)
        }

        fn exists(&self, name: &str) -> Result<bool> {
            self.inner.exists(name)
        }

        fn list(&self) -> Result<Vec<String>> {
            self.inner.list()
        }

        fn acquire_lock(&self, name: &str) -> Result<DirectoryLock> {
            self.inner.acquire_lock(name)
        }
    }

    #[test]
    fn test_failed_auto_commit_keeps_documents_for_next_commit() {
        let directory = Arc::new(FlakyDirectory::default());
        let config = IndexConfig {
            max_buffered_docs: Some(2),
            ..IndexConfig::default()
        };
        let index = Index::open(directory.clone(), config).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();

        directory.fail_writes.store(true, Ordering::SeqCst);
        assert_eq!(writer.add_document(passage("0", "kept")).unwrap(), DocumentId(0));
        assert_eq!(writer.add_document(passage("1", "kept")).unwrap(), DocumentId(1));
        assert_eq!(writer.num_buffered_docs(), 2);
        assert_eq!(index.reader().unwrap().num_docs(), 0);

        directory.fail_writes.store(false, Ordering::SeqCst);
        assert!(writer.commit().unwrap().is_some());
        assert_eq!(writer.num_buffered_docs(), 0);
        assert_eq!(live_ids(&index), vec!["0", "1"]);
    }

    #[test]
    fn test_create_discards_previous_index_but_not_segment_ids() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "old")).unwrap();
        let old_segment = writer.commit().unwrap().unwrap();
        drop(writer);

        let mut writer = index.writer(OpenMode::Create).unwrap();
        assert_eq!(index.reader().unwrap().num_docs(), 0);
        writer.add_document(passage("1", "new")).unwrap();
        let new_segment = writer.commit().unwrap().unwrap();
        assert!(new_segment > old_segment);
        assert!(
            !index
                .directory()
                .exists(&get_segment_file_name(old_segment, SegmentComponent::Terms))
                .unwrap()
        );
    }

    #[test]
    fn test_force_merge_keeps_live_documents() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        for batch in 0..3 {
            for i in 0..3 {
                writer.add_document(passage(&format!("{}-{}", batch, i), "merge me")).unwrap();
            }
            writer.commit().unwrap();
        }
        writer.delete_term(Term::new("passage_ID", "1-1"));
        let merged = writer.force_merge().unwrap();
        assert!(merged.is_some());
        assert_eq!(writer.manifest().segments.len(), 1);
        assert_eq!(writer.manifest().segments[0].deleted_docs, 0);
        let ids = live_ids(&index);
        assert_eq!(ids.len(), 8);
        assert!(!ids.contains(&"1-1".to_string()));
    }

    #[test]
    fn test_close_commits_pending_changes() {
        let index = Index::create_in_ram(IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("0", "closing")).unwrap();
        writer.close().unwrap();
        assert_eq!(live_ids(&index), vec!["0"]);
        assert!(index.writer(OpenMode::Append).is_ok());
    }
}
