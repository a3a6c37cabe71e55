use std::{collections::BTreeMap, sync::Arc};

use tracing::info;

use crate::{
    config::IndexConfig,
    directory::Directory,
    error::Result,
    postings::Term,
    segment::{
        deletes::DeleteSet,
        manifest::SegmentMeta,
        segment_reader::SegmentReader,
        segment_writer::SegmentSerializer,
        stored_fields::StoredFieldsWriter,
    },
    utils::{
        posting::{Posting, merge_all_postings},
        types::{DocId, SegmentId},
    },
};

/// A segment taking part in a merge together with the deletions to drop.
pub struct MergeSource {
    pub reader: Arc<SegmentReader>,
    pub deletes: Option<Arc<DeleteSet>>,
}

impl MergeSource {
    fn is_live(&self, doc_id: DocId) -> bool {
        self.deletes.as_ref().is_none_or(|deletes| !deletes.is_deleted(doc_id))
    }
}

// old local doc id -> new doc id, None for deleted documents
fn build_doc_id_maps(sources: &[MergeSource]) -> (Vec<Vec<Option<DocId>>>, u32) {
    let mut next_doc_id: DocId = 0;
    let maps = sources
        .iter()
        .map(|source| {
            (0..source.reader.max_doc())
                .map(|doc_id| {
                    source.is_live(doc_id).then(|| {
                        next_doc_id += 1;
                        next_doc_id - 1
                    })
                })
                .collect()
        })
        .collect();
    (maps, next_doc_id)
}

/// Writes one segment holding the live documents of `sources`, in source
/// order. Returns `None` when no document is live.
pub fn merge_segments(
    directory: &dyn Directory,
    sources: &[MergeSource],
    segment_id: SegmentId,
    config: &IndexConfig,
) -> Result<Option<SegmentMeta>> {
    let (doc_id_maps, max_doc) = build_doc_id_maps(sources);
    if max_doc == 0 {
        return Ok(None);
    }

    let mut serializer = SegmentSerializer::new(directory, segment_id, config.compression, config.chunk_size);
    let mut cursors: Vec<_> = sources
        .iter()
        .map(|source| source.reader.term_dictionary().iter().peekable())
        .collect();
    let mut no_of_terms: u64 = 0;
    loop {
        // smallest current term among all dictionaries that still have terms
        let smallest_term: Option<Term> = cursors
            .iter_mut()
            .filter_map(|cursor| cursor.peek().map(|(term, _)| term))
            .min()
            .cloned();
        let Some(term) = smallest_term else {
            break;
        };

        let mut posting_lists: Vec<Vec<Posting>> = Vec::new();
        for (source_idx, cursor) in cursors.iter_mut().enumerate() {
            let Some((_, info)) = cursor.next_if(|(current, _)| *current == term) else {
                continue;
            };
            let doc_id_map = &doc_id_maps[source_idx];
            let postings: Vec<Posting> = sources[source_idx]
                .reader
                .postings_for(info)
                .filter_map(|posting| {
                    doc_id_map[posting.doc_id as usize]
                        .map(|doc_id| Posting::new(doc_id, posting.positions))
                })
                .collect();
            if !postings.is_empty() {
                posting_lists.push(postings);
            }
        }
        let merged = merge_all_postings(posting_lists);
        if !merged.is_empty() {
            serializer.add_term(term, &merged);
            no_of_terms += 1;
        }
    }

    let mut field_lengths: BTreeMap<String, Vec<u32>> = sources
        .iter()
        .flat_map(|source| source.reader.norm_fields())
        .map(|field| (field.to_string(), Vec::with_capacity(max_doc as usize)))
        .collect();
    let mut stored_fields = StoredFieldsWriter::new();
    for (source_idx, source) in sources.iter().enumerate() {
        for (old_doc_id, new_doc_id) in doc_id_maps[source_idx].iter().enumerate() {
            if new_doc_id.is_none() {
                continue;
            }
            let old_doc_id = old_doc_id as DocId;
            if let Some(raw) = source.reader.stored_fields().raw(old_doc_id) {
                stored_fields.add_raw(raw);
            }
            for (field, lengths) in field_lengths.iter_mut() {
                lengths.push(source.reader.field_length(field, old_doc_id));
            }
        }
    }

    let meta = serializer.finish(stored_fields, &field_lengths)?;
    info!(
        segment = %segment_id,
        sources = sources.len(),
        max_doc,
        terms = no_of_terms,
        "merged segments"
    );
    Ok(Some(meta))
}
