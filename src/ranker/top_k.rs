use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::utils::types::DocAddress;

/// A matching document and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub address: DocAddress,
    pub score: f32,
}

impl Eq for ScoredDoc {}

// Greater means ranked better: higher score, then lower address.
impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.address.cmp(&self.address))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the `k` best documents seen so far in a min-heap whose root is the
/// weakest kept document.
#[derive(Debug)]
pub struct TopKCollector {
    k: usize,
    heap: BinaryHeap<Reverse<ScoredDoc>>,
    total_hits: u64,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.min(1024)),
            total_hits: 0,
        }
    }

    /// Number of documents offered, kept or not.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn push(&mut self, address: DocAddress, score: f32) {
        self.total_hits += 1;
        if self.k == 0 {
            return;
        }
        let candidate = ScoredDoc { address, score };
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
            return;
        }
        if let Some(mut weakest) = self.heap.peek_mut() {
            if candidate > weakest.0 {
                *weakest = Reverse(candidate);
            }
        }
    }

    /// Best first: score descending, ties by ascending address.
    pub fn into_sorted_vec(self) -> Vec<ScoredDoc> {
        // ascending order of Reverse is descending rank
        self.heap.into_sorted_vec().into_iter().map(|Reverse(doc)| doc).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::SegmentId;
    use proptest::prelude::*;

    fn address(segment: u64, doc: u32) -> DocAddress {
        DocAddress::new(SegmentId(segment), doc)
    }

    #[test]
    fn test_keeps_best_k() {
        let mut collector = TopKCollector::new(2);
        collector.push(address(1, 0), 1.0);
        collector.push(address(1, 1), 3.0);
        collector.push(address(1, 2), 2.0);
        collector.push(address(1, 3), 0.5);
        assert_eq!(collector.total_hits(), 4);
        let top: Vec<_> = collector.into_sorted_vec().iter().map(|d| d.address.doc_id).collect();
        assert_eq!(top, vec![1, 2]);
    }

    #[test]
    fn test_ties_prefer_lower_address() {
        let mut collector = TopKCollector::new(2);
        collector.push(address(2, 0), 1.0);
        collector.push(address(1, 5), 1.0);
        collector.push(address(1, 7), 1.0);
        let top: Vec<_> = collector.into_sorted_vec().iter().map(|d| d.address).collect();
        assert_eq!(top, vec![address(1, 5), address(1, 7)]);
    }

    #[test]
    fn test_zero_k() {
        let mut collector = TopKCollector::new(0);
        collector.push(address(1, 0), 1.0);
        assert!(collector.into_sorted_vec().is_empty());
    }

    proptest! {
        #[test]
        fn matches_full_sort(
            scores in proptest::collection::vec(0u8..10, 0..200),
            k in 0usize..20,
        ) {
            let mut collector = TopKCollector::new(k);
            let mut all = Vec::new();
            for (i, score) in scores.iter().enumerate() {
                let doc = ScoredDoc { address: address(1 + (i % 3) as u64, i as u32), score: *score as f32 };
                collector.push(doc.address, doc.score);
                all.push(doc);
            }
            all.sort_by(|a, b| b.cmp(a));
            all.truncate(k);
            prop_assert_eq!(collector.into_sorted_vec(), all);
        }
    }
}
