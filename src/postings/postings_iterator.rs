use std::{ops::Range, sync::Arc};

use tracing::error;

use crate::{
    compressor::compressor::Compressor,
    postings::chunk::Chunk,
    utils::{
        posting::Posting,
        types::{DocId, TERMINATED},
    },
};

/// Cursor over one term's postings inside a segment. It is positioned on the
/// first posting as soon as it is created; `doc()` returns `TERMINATED` once
/// the list is exhausted.
///
/// Chunks are decoded lazily. `advance` compares the target against each
/// chunk header's `max_doc_id` and jumps over chunks that cannot contain it.
#[derive(Debug, Clone)]
pub struct PostingsIterator {
    data: Arc<[u8]>,
    next_chunk_offset: usize,
    end: usize,
    doc_freq: u32,
    compressor: Compressor,
    current_chunk: Chunk,
    chunk_index: usize,
    current_doc: DocId,
}

impl PostingsIterator {
    pub fn new(data: Arc<[u8]>, range: Range<usize>, doc_freq: u32, compressor: Compressor) -> Self {
        let mut iterator = Self {
            data,
            next_chunk_offset: range.start,
            end: range.end,
            doc_freq,
            compressor,
            current_chunk: Chunk::new(),
            chunk_index: 0,
            current_doc: TERMINATED,
        };
        if iterator.load_next_chunk(0) {
            iterator.current_doc = iterator.current_chunk.doc_ids[0];
        }
        iterator
    }

    pub fn empty() -> Self {
        Self {
            data: Arc::from(Vec::new()),
            next_chunk_offset: 0,
            end: 0,
            doc_freq: 0,
            compressor: Compressor::default(),
            current_chunk: Chunk::new(),
            chunk_index: 0,
            current_doc: TERMINATED,
        }
    }

    /// Number of documents in the list, deleted ones included.
    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    pub fn doc(&self) -> DocId {
        self.current_doc
    }

    pub fn term_frequency(&self) -> u32 {
        if self.current_doc == TERMINATED {
            return 0;
        }
        self.current_chunk.doc_frequencies[self.chunk_index]
    }

    pub fn positions(&self) -> &[u32] {
        if self.current_doc == TERMINATED {
            return &[];
        }
        &self.current_chunk.doc_positions[self.chunk_index]
    }

    pub fn posting(&self) -> Option<Posting> {
        if self.current_doc == TERMINATED {
            return None;
        }
        Some(self.current_chunk.posting(self.chunk_index))
    }

    /// Moves to the next posting and returns its doc id.
    pub fn next_doc(&mut self) -> DocId {
        if self.current_doc == TERMINATED {
            return TERMINATED;
        }
        self.chunk_index += 1;
        if self.chunk_index >= self.current_chunk.len() && !self.load_next_chunk(0) {
            return self.terminate();
        }
        self.current_doc = self.current_chunk.doc_ids[self.chunk_index];
        self.current_doc
    }

    /// Moves to the first posting with a doc id `>= target` and returns it.
    /// Never moves backwards.
    pub fn advance(&mut self, target: DocId) -> DocId {
        if self.current_doc >= target {
            return self.current_doc;
        }
        if self.current_chunk.max_doc_id < target && !self.load_next_chunk(target) {
            return self.terminate();
        }
        self.chunk_index = gallop(&self.current_chunk.doc_ids, self.chunk_index, target);
        self.current_doc = self.current_chunk.doc_ids[self.chunk_index];
        self.current_doc
    }

    // Decodes the next chunk whose max_doc_id reaches `target`, skipping the
    // ones before it by header alone.
    fn load_next_chunk(&mut self, target: DocId) -> bool {
        while self.next_chunk_offset < self.end {
            let bytes = &self.data[self.next_chunk_offset..self.end];
            let Some(header) = Chunk::read_header(bytes) else {
                error!(offset = self.next_chunk_offset, "truncated postings chunk header");
                return false;
            };
            if header.max_doc_id < target {
                self.next_chunk_offset += header.encoded_len();
                continue;
            }
            match Chunk::decode(bytes, &self.compressor) {
                Some(chunk) if !chunk.is_empty() => {
                    self.next_chunk_offset += header.encoded_len();
                    self.current_chunk = chunk;
                    self.chunk_index = 0;
                    return true;
                }
                _ => {
                    error!(offset = self.next_chunk_offset, "corrupted postings chunk");
                    return false;
                }
            }
        }
        false
    }

    fn terminate(&mut self) -> DocId {
        self.next_chunk_offset = self.end;
        self.current_chunk.reset();
        self.chunk_index = 0;
        self.current_doc = TERMINATED;
        TERMINATED
    }
}

// First index >= `from` holding a value >= target. The caller guarantees the
// last value of `doc_ids` is >= target.
fn gallop(doc_ids: &[DocId], from: usize, target: DocId) -> usize {
    let mut bound = 1;
    while from + bound < doc_ids.len() && doc_ids[from + bound] < target {
        bound *= 2;
    }
    let low = from + bound / 2;
    let high = (from + bound + 1).min(doc_ids.len());
    low + doc_ids[low..high].partition_point(|&doc_id| doc_id < target)
}

impl Iterator for PostingsIterator {
    type Item = Posting;

    fn next(&mut self) -> Option<Posting> {
        let posting = self.posting()?;
        self.next_doc();
        Some(posting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compressor::compressor::CompressionAlgorithm, postings::chunk::encode_postings};
    use proptest::prelude::*;

    fn build(doc_ids: &[u32], chunk_size: usize) -> PostingsIterator {
        let compressor = Compressor::new(CompressionAlgorithm::VarByte);
        let postings: Vec<Posting> = doc_ids
            .iter()
            .map(|&doc_id| Posting::new(doc_id, vec![doc_id % 7, doc_id % 7 + 3]))
            .collect();
        let (bytes, _) = encode_postings(&postings, chunk_size, &compressor);
        let len = bytes.len();
        PostingsIterator::new(Arc::from(bytes), 0..len, doc_ids.len() as u32, compressor)
    }

    #[test]
    fn test_iterates_in_order() {
        let iterator = build(&[1, 4, 9, 16, 25, 36], 4);
        let doc_ids: Vec<u32> = iterator.map(|p| p.doc_id).collect();
        assert_eq!(doc_ids, vec![1, 4, 9, 16, 25, 36]);
    }

    #[test]
    fn test_advance_skips_chunks() {
        let doc_ids: Vec<u32> = (0..200).map(|i| i * 3).collect();
        let mut iterator = build(&doc_ids, 8);
        assert_eq!(iterator.doc(), 0);
        assert_eq!(iterator.advance(100), 102);
        assert_eq!(iterator.positions(), &[102 % 7, 102 % 7 + 3]);
        assert_eq!(iterator.term_frequency(), 2);
        // never moves backwards
        assert_eq!(iterator.advance(50), 102);
        assert_eq!(iterator.next_doc(), 105);
        assert_eq!(iterator.advance(597), 597);
        assert_eq!(iterator.advance(598), TERMINATED);
        assert_eq!(iterator.next_doc(), TERMINATED);
        assert!(iterator.posting().is_none());
    }

    #[test]
    fn test_empty_iterator() {
        let mut iterator = PostingsIterator::empty();
        assert_eq!(iterator.doc(), TERMINATED);
        assert_eq!(iterator.advance(3), TERMINATED);
        assert_eq!(iterator.next(), None);
    }

    #[test]
    fn test_corrupted_chunk_terminates() {
        let compressor = Compressor::new(CompressionAlgorithm::VarByte);
        let postings: Vec<Posting> = (0..10).map(|i| Posting::new(i, vec![0])).collect();
        let (mut bytes, _) = encode_postings(&postings, 4, &compressor);
        let len = bytes.len();
        bytes.truncate(len - 2);
        let len = bytes.len();
        let iterator = PostingsIterator::new(Arc::from(bytes), 0..len, 10, compressor);
        // the first two chunks are intact
        assert_eq!(iterator.count(), 8);
    }

    proptest! {
        #[test]
        fn advance_finds_first_doc_at_or_after_target(
            mut doc_ids in proptest::collection::vec(0u32..5000, 1..300),
            targets in proptest::collection::vec(0u32..5200, 1..20),
            chunk_size in 1usize..70,
        ) {
            doc_ids.sort_unstable();
            doc_ids.dedup();
            let mut targets = targets;
            targets.sort_unstable();
            let mut iterator = build(&doc_ids, chunk_size);
            for target in targets {
                let expected = doc_ids.iter().copied().find(|&d| d >= target).unwrap_or(TERMINATED);
                prop_assert_eq!(iterator.advance(target), expected);
            }
        }
    }
}
