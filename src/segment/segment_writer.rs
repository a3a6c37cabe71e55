use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    compressor::compressor::{CompressionAlgorithm, Compressor},
    config::IndexConfig,
    directory::Directory,
    error::Result,
    postings::{Term, TermDictionary, TermInfo, chunk::encode_postings},
    segment::{
        buffer::SegmentBuffer,
        manifest::SegmentMeta,
        norms::encode_norms,
        stored_fields::StoredFieldsWriter,
    },
    utils::{
        paths::{SegmentComponent, get_segment_file_name},
        posting::Posting,
        types::SegmentId,
    },
};

/// Writes the files of one new segment. Terms must be added in increasing
/// order; nothing is visible to readers until a manifest references the
/// segment.
pub struct SegmentSerializer<'a> {
    directory: &'a dyn Directory,
    segment_id: SegmentId,
    compressor: Compressor,
    chunk_size: usize,
    terms: Vec<(Term, TermInfo)>,
    postings: Vec<u8>,
}

impl<'a> SegmentSerializer<'a> {
    pub fn new(
        directory: &'a dyn Directory,
        segment_id: SegmentId,
        compression: CompressionAlgorithm,
        chunk_size: u16,
    ) -> Self {
        Self {
            directory,
            segment_id,
            compressor: Compressor::new(compression),
            chunk_size: chunk_size.max(1) as usize,
            terms: Vec::new(),
            postings: Vec::new(),
        }
    }

    pub fn add_term(&mut self, term: Term, postings: &[Posting]) {
        if postings.is_empty() {
            return;
        }
        debug_assert!(self.terms.last().is_none_or(|(last, _)| *last < term));
        let (bytes, _) = encode_postings(postings, self.chunk_size, &self.compressor);
        let info = TermInfo {
            doc_freq: postings.len() as u32,
            postings_offset: self.postings.len() as u64,
            postings_len: bytes.len() as u32,
        };
        self.postings.extend(bytes);
        self.terms.push((term, info));
    }

    pub fn finish(
        self,
        stored_fields: StoredFieldsWriter,
        field_lengths: &BTreeMap<String, Vec<u32>>,
    ) -> Result<SegmentMeta> {
        let max_doc = stored_fields.len() as u32;
        let no_of_terms = self.terms.len();
        let file = |component| get_segment_file_name(self.segment_id, component);

        self.directory
            .write(&file(SegmentComponent::Postings), &self.postings)?;
        self.directory.write(
            &file(SegmentComponent::Terms),
            &TermDictionary::from_sorted(self.terms).encode(),
        )?;
        self.directory
            .write(&file(SegmentComponent::Store), &stored_fields.finish())?;
        self.directory
            .write(&file(SegmentComponent::Norms), &encode_norms(field_lengths))?;

        debug!(
            segment = %self.segment_id,
            max_doc,
            terms = no_of_terms,
            "wrote segment"
        );
        Ok(SegmentMeta {
            segment_id: self.segment_id,
            max_doc,
            deleted_docs: 0,
            delete_generation: None,
            compression: self.compressor.compression_algorithm(),
        })
    }
}

/// Flushes the write buffer into segment `segment_id`.
pub fn write_buffer(
    directory: &dyn Directory,
    segment_id: SegmentId,
    buffer: &SegmentBuffer,
    config: &IndexConfig,
) -> Result<SegmentMeta> {
    let mut serializer = SegmentSerializer::new(directory, segment_id, config.compression, config.chunk_size);
    for (term, postings) in buffer.sorted_terms() {
        serializer.add_term(term.clone(), postings);
    }
    let mut stored_fields = StoredFieldsWriter::new();
    for document in buffer.documents() {
        stored_fields.add_document(document)?;
    }
    serializer.finish(stored_fields, &buffer.field_lengths())
}
