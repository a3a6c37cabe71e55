use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    analysis::{AnalyzerRegistry, IndexedAs},
    document::Document,
    error::{Result, SearchError},
    index::{index::Index, searcher::Searcher},
    postings::Term,
    segment::{SegmentMeta, SegmentReader, deletes::DeleteSet, segment_reader::load_deletes},
    utils::{
        posting::Posting,
        types::{DocAddress, DocId, SegmentId},
    },
};

const MAX_OPEN_ATTEMPTS: usize = 5;

/// One segment as seen by a snapshot: the shared segment data plus the
/// deletions that were committed at the snapshot's generation.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    pub meta: SegmentMeta,
    pub reader: Arc<SegmentReader>,
    pub deletes: Option<Arc<DeleteSet>>,
}

impl SegmentEntry {
    pub fn segment_id(&self) -> SegmentId {
        self.meta.segment_id
    }

    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        self.deletes.as_ref().is_some_and(|deletes| deletes.is_deleted(doc_id))
    }
}

#[derive(Debug)]
struct Snapshot {
    generation: u64,
    segments: Vec<SegmentEntry>,
    analyzers: AnalyzerRegistry,
    schema: BTreeMap<String, IndexedAs>,
}

/// Point-in-time view of an index. Commits made after the reader was opened
/// are never visible through it; call `reload` for a fresh view. Cloning is
/// cheap and clones can be sent to other threads.
#[derive(Debug, Clone)]
pub struct IndexReader {
    index: Index,
    snapshot: Arc<Snapshot>,
}

impl IndexReader {
    pub fn open(index: Index) -> Result<IndexReader> {
        let mut attempt = 1;
        loop {
            match Self::load_snapshot(&index) {
                Ok(snapshot) => {
                    debug!(
                        generation = snapshot.generation,
                        segments = snapshot.segments.len(),
                        "opened index reader"
                    );
                    return Ok(IndexReader {
                        index,
                        snapshot: Arc::new(snapshot),
                    });
                }
                // a commit removed a file between reading the manifest and the segment
                Err(e) if e.is_missing_file() && attempt < MAX_OPEN_ATTEMPTS => {
                    info!(attempt, error = %e, "index changed while opening reader, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn load_snapshot(index: &Index) -> Result<Snapshot> {
        let manifest = index
            .load_manifest()?
            .ok_or_else(|| SearchError::NotFound("no committed index in directory".to_string()))?;
        let mut segments = Vec::with_capacity(manifest.segments.len());
        for meta in &manifest.segments {
            segments.push(SegmentEntry {
                reader: index.segment_reader(meta)?,
                deletes: load_deletes(index.directory(), meta)?,
                meta: meta.clone(),
            });
        }
        Ok(Snapshot {
            generation: manifest.generation,
            segments,
            analyzers: AnalyzerRegistry::new(manifest.analyzers),
            schema: manifest.schema,
        })
    }

    /// A new reader over the latest commit.
    pub fn reload(&self) -> Result<IndexReader> {
        Self::open(self.index.clone())
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.clone())
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    pub fn segments(&self) -> &[SegmentEntry] {
        &self.snapshot.segments
    }

    pub fn segment_count(&self) -> usize {
        self.snapshot.segments.len()
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.snapshot.analyzers
    }

    pub fn schema(&self) -> &BTreeMap<String, IndexedAs> {
        &self.snapshot.schema
    }

    /// How `field` was indexed, or `SchemaMismatch` if no committed document
    /// ever indexed it.
    pub fn check_field(&self, field: &str) -> Result<IndexedAs> {
        self.snapshot
            .schema
            .get(field)
            .copied()
            .ok_or_else(|| SearchError::SchemaMismatch {
                field: field.to_string(),
            })
    }

    /// Live documents.
    pub fn num_docs(&self) -> u64 {
        self.snapshot.segments.iter().map(|entry| entry.meta.num_docs() as u64).sum()
    }

    /// Documents including deleted ones. Used as N in IDF.
    pub fn max_doc(&self) -> u64 {
        self.snapshot.segments.iter().map(|entry| entry.meta.max_doc as u64).sum()
    }

    pub fn doc_freq(&self, term: &Term) -> u64 {
        self.snapshot
            .segments
            .iter()
            .map(|entry| entry.reader.doc_freq(term) as u64)
            .sum()
    }

    /// Mean token count of `field` over the documents having it; 0 when none do.
    pub fn average_field_length(&self, field: &str) -> f32 {
        let (total_length, doc_count) = self
            .snapshot
            .segments
            .iter()
            .filter_map(|entry| entry.reader.field_norms(field))
            .fold((0u64, 0u64), |(total, count), norms| {
                (total + norms.total_length, count + norms.doc_count as u64)
            });
        if doc_count == 0 {
            return 0.0;
        }
        total_length as f32 / doc_count as f32
    }

    /// Distinct terms of `field` starting with `prefix`, sorted.
    pub fn terms_with_prefix(&self, field: &str, prefix: &str) -> Vec<String> {
        let mut terms: Vec<String> = self
            .snapshot
            .segments
            .iter()
            .flat_map(|entry| entry.reader.terms_with_prefix(field, prefix))
            .map(|term| term.text.clone())
            .collect();
        terms.sort_unstable();
        terms.dedup();
        terms
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&SegmentEntry> {
        self.snapshot
            .segments
            .iter()
            .find(|entry| entry.segment_id() == segment_id)
    }

    /// Stored values of a live document of this snapshot.
    pub fn fetch_stored_fields(&self, address: DocAddress) -> Result<Document> {
        let entry = self
            .segment(address.segment_id)
            .ok_or_else(|| SearchError::NotFound(format!("segment {} is not part of this snapshot", address.segment_id)))?;
        if address.doc_id >= entry.meta.max_doc {
            return Err(SearchError::NotFound(format!("document {} does not exist", address)));
        }
        if entry.is_deleted(address.doc_id) {
            return Err(SearchError::NotFound(format!("document {} is deleted", address)));
        }
        entry.reader.document(address.doc_id)
    }

    /// Live postings of `term` across all segments, in segment then doc id order.
    pub fn term_postings<'a>(&'a self, term: &'a Term) -> impl Iterator<Item = (DocAddress, Posting)> + 'a {
        self.snapshot.segments.iter().flat_map(move |entry| {
            entry
                .reader
                .postings(term)
                .filter(move |posting| !entry.is_deleted(posting.doc_id))
                .map(move |posting| (DocAddress::new(entry.segment_id(), posting.doc_id), posting))
        })
    }
}
