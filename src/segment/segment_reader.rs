use std::sync::Arc;

use crate::{
    compressor::compressor::Compressor,
    directory::Directory,
    document::Document,
    error::{Result, SearchError},
    postings::{PostingsIterator, Term, TermDictionary, TermInfo},
    segment::{
        deletes::DeleteSet,
        manifest::SegmentMeta,
        norms::{FieldNorms, NormsReader},
        stored_fields::StoredFieldsReader,
    },
    utils::{
        paths::{SegmentComponent, get_deletes_file_name, get_segment_file_name},
        types::{DocId, SegmentId},
    },
};

/// Read-only view of one segment's immutable files. Shared between every
/// reader whose snapshot contains the segment.
#[derive(Debug)]
pub struct SegmentReader {
    segment_id: SegmentId,
    max_doc: u32,
    compressor: Compressor,
    terms: TermDictionary,
    postings: Arc<[u8]>,
    stored_fields: StoredFieldsReader,
    norms: NormsReader,
}

impl SegmentReader {
    pub fn open(directory: &dyn Directory, meta: &SegmentMeta) -> Result<Self> {
        let file = |component| get_segment_file_name(meta.segment_id, component);

        let terms_file = file(SegmentComponent::Terms);
        let terms = TermDictionary::decode(&directory.read(&terms_file)?, &terms_file)?;

        let postings_file = file(SegmentComponent::Postings);
        let postings = directory.read(&postings_file)?;
        for (term, info) in terms.iter() {
            let end = info.postings_offset.checked_add(info.postings_len as u64);
            if end.is_none_or(|end| end > postings.len() as u64) {
                return Err(SearchError::corrupted(
                    postings_file,
                    format!("postings of {} out of range", term),
                ));
            }
        }

        let store_file = file(SegmentComponent::Store);
        let stored_fields = StoredFieldsReader::open(directory.read(&store_file)?, &store_file)?;
        if stored_fields.len() != meta.max_doc as usize {
            return Err(SearchError::corrupted(
                store_file,
                format!("{} documents stored, manifest says {}", stored_fields.len(), meta.max_doc),
            ));
        }

        let norms_file = file(SegmentComponent::Norms);
        let norms = NormsReader::decode(&directory.read(&norms_file)?, meta.max_doc, &norms_file)?;

        Ok(Self {
            segment_id: meta.segment_id,
            max_doc: meta.max_doc,
            compressor: Compressor::new(meta.compression),
            terms,
            postings,
            stored_fields,
            norms,
        })
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn term_dictionary(&self) -> &TermDictionary {
        &self.terms
    }

    pub fn term_info(&self, term: &Term) -> Option<&TermInfo> {
        self.terms.get(&term.field, &term.text)
    }

    /// Documents containing `term`, deleted ones included.
    pub fn doc_freq(&self, term: &Term) -> u32 {
        self.term_info(term).map_or(0, |info| info.doc_freq)
    }

    pub fn postings(&self, term: &Term) -> PostingsIterator {
        match self.term_info(term) {
            Some(info) => self.postings_for(info),
            None => PostingsIterator::empty(),
        }
    }

    pub fn postings_for(&self, info: &TermInfo) -> PostingsIterator {
        let start = info.postings_offset as usize;
        let end = start + info.postings_len as usize;
        PostingsIterator::new(self.postings.clone(), start..end, info.doc_freq, self.compressor)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.terms.has_field(field)
    }

    pub fn terms_with_prefix<'a>(&'a self, field: &'a str, prefix: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.terms.terms_with_prefix(field, prefix).map(|(term, _)| term)
    }

    pub fn stored_fields(&self) -> &StoredFieldsReader {
        &self.stored_fields
    }

    pub fn document(&self, doc_id: DocId) -> Result<Document> {
        self.stored_fields.document(doc_id)
    }

    pub fn field_norms(&self, field: &str) -> Option<&FieldNorms> {
        self.norms.field(field)
    }

    /// Fields with recorded lengths, in no particular order.
    pub fn norm_fields(&self) -> impl Iterator<Item = &str> {
        self.norms.fields().map(|(field, _)| field.as_str())
    }

    pub fn field_length(&self, field: &str, doc_id: DocId) -> u32 {
        self.norms.field_length(field, doc_id)
    }
}

/// Loads the deletion set a manifest entry points at.
pub fn load_deletes(directory: &dyn Directory, meta: &SegmentMeta) -> Result<Option<Arc<DeleteSet>>> {
    let Some(generation) = meta.delete_generation else {
        return Ok(None);
    };
    let file_name = get_deletes_file_name(meta.segment_id, generation);
    let deletes = DeleteSet::decode(&directory.read(&file_name)?, &file_name)?;
    if deletes.max_doc() != meta.max_doc {
        return Err(SearchError::corrupted(file_name, "deletion bitset size mismatch"));
    }
    Ok(Some(Arc::new(deletes)))
}
