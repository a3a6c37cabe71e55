use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::{
    analysis::{AnalyzerRegistry, IndexedAs},
    document::{Document, FieldValue},
    error::{Result, SearchError},
    postings::Term,
    utils::{
        posting::Posting,
        types::{DocId, DocumentId},
    },
};

// rough per-entry overheads used for the auto-commit byte estimate
const TERM_OVERHEAD: usize = 64;
const POSTING_OVERHEAD: usize = 32;
const POSITION_BYTES: usize = 4;

/// Documents added since the last commit, already inverted.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    postings: FxHashMap<Term, Vec<Posting>>,
    documents: Vec<Document>,
    field_lengths: FxHashMap<String, Vec<u32>>,
    schema: BTreeMap<String, IndexedAs>,
    estimated_bytes: usize,
    position_increment_gap: u32,
}

#[derive(Default)]
struct FieldState {
    next_position: u32,
    length: u32,
    has_value: bool,
}

impl SegmentBuffer {
    pub fn new(position_increment_gap: u32) -> Self {
        Self {
            position_increment_gap,
            ..Self::default()
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.documents.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    /// Fields first indexed by buffered documents.
    pub fn schema(&self) -> &BTreeMap<String, IndexedAs> {
        &self.schema
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Inverts `document` and assigns it the next local doc id. `committed_schema`
    /// is checked first so a rejected document leaves the buffer untouched.
    pub fn add_document(
        &mut self,
        document: Document,
        analyzers: &AnalyzerRegistry,
        committed_schema: &BTreeMap<String, IndexedAs>,
    ) -> Result<DocumentId> {
        let mut document_schema: BTreeMap<&str, IndexedAs> = BTreeMap::new();
        for field in document.indexed_fields() {
            let indexed_as = indexed_as(&field.value);
            let existing = document_schema
                .get(field.name.as_str())
                .or_else(|| self.schema.get(&field.name))
                .or_else(|| committed_schema.get(&field.name))
                .copied();
            match existing {
                Some(existing) if existing != indexed_as => {
                    return Err(SearchError::SchemaConflict {
                        field: field.name.clone(),
                        existing: existing.to_string(),
                        requested: indexed_as.to_string(),
                    });
                }
                _ => {
                    document_schema.insert(field.name.as_str(), indexed_as);
                }
            }
        }

        let doc_id: DocId = self.documents.len() as DocId;
        let mut fields: FxHashMap<&str, FieldState> = FxHashMap::default();
        // positions are resolved before any posting is touched
        let mut occurrences: Vec<(Term, u32)> = Vec::new();
        for field in document.indexed_fields() {
            let indexed_as = indexed_as(&field.value);
            let tokens = analyzers.analyze(&field.name, indexed_as, field.value.as_str());
            let overflow = || SearchError::PositionOverflow {
                field: field.name.clone(),
            };
            let state = fields.entry(field.name.as_str()).or_default();
            let base = if state.has_value {
                state
                    .next_position
                    .checked_add(self.position_increment_gap)
                    .ok_or_else(overflow)?
            } else {
                0
            };
            state.has_value = true;
            state.next_position = base;
            for token in &tokens {
                let position = base.checked_add(token.position).ok_or_else(overflow)?;
                occurrences.push((Term::new(field.name.as_str(), token.word.as_str()), position));
                state.next_position = state.next_position.max(position.saturating_add(1));
            }
            state.length += tokens.len() as u32;
        }
        for (term, position) in occurrences {
            self.insert_or_merge(term, doc_id, position);
        }

        for (field, state) in fields {
            let lengths = self.field_lengths.entry(field.to_string()).or_default();
            lengths.resize(doc_id as usize, 0);
            lengths.push(state.length);
        }
        for (field, indexed_as) in document_schema {
            if !committed_schema.contains_key(field) {
                self.schema.entry(field.to_string()).or_insert(indexed_as);
            }
        }

        self.estimated_bytes += document
            .fields()
            .iter()
            .map(|field| field.name.len() + field.value.as_str().len() + POSTING_OVERHEAD)
            .sum::<usize>();
        self.documents.push(document);
        Ok(DocumentId(doc_id))
    }

    /// Records one occurrence of `term` at `position`. Occurrences in the same
    /// document extend the document's last posting.
    pub fn insert_or_merge(&mut self, term: Term, doc_id: DocId, position: u32) {
        if !self.postings.contains_key(&term) {
            self.estimated_bytes += TERM_OVERHEAD + term.field.len() + term.text.len();
        }
        let postings = self.postings.entry(term).or_default();
        match postings.last_mut() {
            Some(last) if last.doc_id == doc_id => last.positions.push(position),
            _ => {
                self.estimated_bytes += POSTING_OVERHEAD;
                postings.push(Posting::new(doc_id, vec![position]));
            }
        }
        self.estimated_bytes += POSITION_BYTES;
    }

    pub fn postings(&self, term: &Term) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    /// Buffered documents below `limit` containing `term`.
    pub fn doc_ids_containing(&self, term: &Term, limit: DocId) -> Vec<DocId> {
        self.postings(term)
            .unwrap_or_default()
            .iter()
            .map(|posting| posting.doc_id)
            .take_while(|&doc_id| doc_id < limit)
            .collect()
    }

    /// All terms with their postings, sorted by term.
    pub fn sorted_terms(&self) -> Vec<(&Term, &[Posting])> {
        let mut terms: Vec<(&Term, &[Posting])> = self
            .postings
            .iter()
            .map(|(term, postings)| (term, postings.as_slice()))
            .collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));
        terms
    }

    /// Per-field token counts padded to one entry per buffered document.
    pub fn field_lengths(&self) -> BTreeMap<String, Vec<u32>> {
        let max_doc = self.documents.len();
        self.field_lengths
            .iter()
            .map(|(field, lengths)| {
                let mut lengths = lengths.clone();
                lengths.resize(max_doc, 0);
                (field.clone(), lengths)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.documents.clear();
        self.field_lengths.clear();
        self.schema.clear();
        self.estimated_bytes = 0;
    }
}

fn indexed_as(value: &FieldValue) -> IndexedAs {
    match value {
        FieldValue::Token(_) => IndexedAs::Token,
        _ => IndexedAs::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> SegmentBuffer {
        SegmentBuffer::new(100)
    }

    #[test]
    fn test_postings_and_lengths() {
        let mut buffer = buffer();
        let analyzers = AnalyzerRegistry::default();
        let schema = BTreeMap::new();
        let doc = Document::builder()
            .token("passage_ID", "0")
            .text("passage_text", "how long is the long road")
            .build();
        assert_eq!(buffer.add_document(doc, &analyzers, &schema).unwrap(), DocumentId(0));

        let long = buffer.postings(&Term::new("passage_text", "long")).unwrap();
        assert_eq!(long, &[Posting::new(0, vec![1, 4])]);
        assert!(buffer.postings(&Term::new("passage_text", "the")).is_none());
        assert_eq!(buffer.postings(&Term::new("passage_ID", "0")).unwrap().len(), 1);

        let lengths = buffer.field_lengths();
        assert_eq!(lengths["passage_text"], vec![4]);
        assert_eq!(lengths["passage_ID"], vec![1]);
        assert_eq!(buffer.schema()["passage_ID"], IndexedAs::Token);
    }

    #[test]
    fn test_repeated_values_are_separated_by_gap() {
        let mut buffer = buffer();
        let doc = Document::builder()
            .text("answers", "quick brown")
            .text("answers", "fox jumps")
            .build();
        buffer
            .add_document(doc, &AnalyzerRegistry::default(), &BTreeMap::new())
            .unwrap();
        let fox = buffer.postings(&Term::new("answers", "fox")).unwrap();
        assert_eq!(fox[0].positions, vec![102]);
        assert_eq!(buffer.field_lengths()["answers"], vec![4]);
    }

    #[test]
    fn test_position_overflow_is_rejected() {
        let mut buffer = SegmentBuffer::new(u32::MAX);
        let analyzers = AnalyzerRegistry::default();
        let schema = BTreeMap::new();
        let doc = Document::builder()
            .text("answers", "quick brown")
            .text("answers", "lazy dog")
            .build();
        let err = buffer.add_document(doc, &analyzers, &schema).unwrap_err();
        assert!(matches!(err, SearchError::PositionOverflow { ref field } if field == "answers"));
        assert!(buffer.is_empty());
        assert!(buffer.postings(&Term::new("answers", "quick")).is_none());
        assert!(buffer.field_lengths().is_empty());
    }

    #[test]
    fn test_documents_without_a_field_get_zero_length() {
        let mut buffer = buffer();
        let analyzers = AnalyzerRegistry::default();
        let schema = BTreeMap::new();
        buffer
            .add_document(Document::builder().stored("note", "x").build(), &analyzers, &schema)
            .unwrap();
        buffer
            .add_document(Document::builder().text("url", "alpha beta").build(), &analyzers, &schema)
            .unwrap();
        buffer
            .add_document(Document::builder().build(), &analyzers, &schema)
            .unwrap();
        assert_eq!(buffer.field_lengths()["url"], vec![0, 2, 0]);
        assert_eq!(buffer.num_docs(), 3);
    }

    #[test]
    fn test_schema_conflict_leaves_buffer_untouched() {
        let mut buffer = buffer();
        let analyzers = AnalyzerRegistry::default();
        let mut committed = BTreeMap::new();
        committed.insert("query_id".to_string(), IndexedAs::Token);
        let doc = Document::builder()
            .text("query", "anything")
            .text("query_id", "12")
            .build();
        let err = buffer.add_document(doc, &analyzers, &committed).unwrap_err();
        assert!(matches!(err, SearchError::SchemaConflict { .. }));
        assert!(buffer.is_empty());
        assert_eq!(buffer.estimated_bytes(), 0);
    }

    #[test]
    fn test_doc_ids_containing_respects_limit() {
        let mut buffer = buffer();
        let analyzers = AnalyzerRegistry::default();
        let schema = BTreeMap::new();
        for _ in 0..3 {
            buffer
                .add_document(Document::builder().token("id", "same").build(), &analyzers, &schema)
                .unwrap();
        }
        let term = Term::new("id", "same");
        assert_eq!(buffer.doc_ids_containing(&term, 2), vec![0, 1]);
        assert!(buffer.doc_ids_containing(&Term::new("id", "other"), 3).is_empty());
    }
}
