use crate::{
    error::{Result, SearchError},
    utils::{bytes::ByteReader, types::DocId},
};

/// Bitset of deleted local doc ids of one segment. A deletion file is written
/// under a new generation every time the set grows, so older manifests keep
/// pointing at the set they were committed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSet {
    words: Vec<u64>,
    max_doc: u32,
    count: u32,
}

impl DeleteSet {
    pub fn new(max_doc: u32) -> Self {
        Self {
            words: vec![0; (max_doc as usize).div_ceil(64)],
            max_doc,
            count: 0,
        }
    }

    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        if doc_id >= self.max_doc {
            return false;
        }
        self.words[doc_id as usize / 64] & (1 << (doc_id % 64)) != 0
    }

    /// Returns true if the document was live before.
    pub fn delete(&mut self, doc_id: DocId) -> bool {
        if doc_id >= self.max_doc || self.is_deleted(doc_id) {
            return false;
        }
        self.words[doc_id as usize / 64] |= 1 << (doc_id % 64);
        self.count += 1;
        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.words.len() * 8);
        out.extend_from_slice(&self.max_doc.to_le_bytes());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8], file_name: &str) -> Result<Self> {
        let corrupted = || SearchError::corrupted(file_name, "truncated deletion bitset");
        let mut reader = ByteReader::new(bytes);
        let max_doc = reader.read_u32().ok_or_else(corrupted)?;
        let no_of_words = (max_doc as usize).div_ceil(64);
        let mut words = Vec::with_capacity(no_of_words.min(bytes.len()));
        for _ in 0..no_of_words {
            words.push(reader.read_u64().ok_or_else(corrupted)?);
        }
        let count = words.iter().map(|word| word.count_ones()).sum();
        Ok(Self { words, max_doc, count })
    }
}
