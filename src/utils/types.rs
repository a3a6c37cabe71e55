use std::fmt;

use serde::{Deserialize, Serialize};

/// Document id local to one segment.
pub type DocId = u32;

/// Sentinel returned by postings iterators and scorers once they are exhausted.
pub const TERMINATED: DocId = u32::MAX;

/// Identifies a committed segment. Ids grow with every commit and are never reused
/// within one index, so they also order segments by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// Ordinal handed out by the writer for a buffered document. It becomes the
/// document's local id in the segment produced by the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub DocId);

/// Globally unique reference to a committed document: (segment, local id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocAddress {
    pub segment_id: SegmentId,
    pub doc_id: DocId,
}

impl DocAddress {
    pub fn new(segment_id: SegmentId, doc_id: DocId) -> Self {
        Self { segment_id, doc_id }
    }

    pub fn from_document_id(segment_id: SegmentId, document_id: DocumentId) -> Self {
        Self {
            segment_id,
            doc_id: document_id.0,
        }
    }
}

impl fmt::Display for DocAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.segment_id, self.doc_id)
    }
}
