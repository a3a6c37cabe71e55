use std::collections::BinaryHeap;

use crate::utils::types::DocId;

/// One document's occurrences of a term: the document id and the token positions
/// of every occurrence. The term frequency is the number of positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Self {
        Self { doc_id, positions }
    }

    pub fn term_frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

#[derive(Eq, PartialEq)]
struct PostingWithSource {
    posting: Posting,
    list_idx: usize,
}

impl Ord for PostingWithSource {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse for min-heap, compare by doc_id then by source list
        other
            .posting
            .doc_id
            .cmp(&self.posting.doc_id)
            .then_with(|| other.list_idx.cmp(&self.list_idx))
    }
}

impl PartialOrd for PostingWithSource {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// K-way merge of posting lists that are each sorted by doc id. Postings of the
/// same document coming from different lists are combined into one posting with
/// sorted positions, so the output is strictly increasing in doc id.
pub fn merge_all_postings(lists: Vec<Vec<Posting>>) -> Vec<Posting> {
    let total_size: usize = lists.iter().map(|l| l.len()).sum();
    let mut result: Vec<Posting> = Vec::with_capacity(total_size);
    let mut heap = BinaryHeap::new();

    let mut iterators: Vec<_> = lists.into_iter().map(|list| list.into_iter()).collect();

    for (idx, iter) in iterators.iter_mut().enumerate() {
        if let Some(posting) = iter.next() {
            heap.push(PostingWithSource {
                posting,
                list_idx: idx,
            });
        }
    }

    while let Some(PostingWithSource { posting, list_idx }) = heap.pop() {
        match result.last_mut() {
            Some(last) if last.doc_id == posting.doc_id => {
                last.positions.extend(posting.positions);
                last.positions.sort_unstable();
            }
            _ => result.push(posting),
        }
        if let Some(next_posting) = iterators[list_idx].next() {
            heap.push(PostingWithSource {
                posting: next_posting,
                list_idx,
            });
        }
    }
    result
}
