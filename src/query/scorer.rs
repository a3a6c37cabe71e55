use std::sync::Arc;

use crate::{
    postings::PostingsIterator,
    scoring::bm_25::Bm25Weight,
    segment::SegmentReader,
    utils::types::{DocId, TERMINATED},
};

/// A cursor over the matching documents of one segment, in increasing doc id
/// order. A scorer is positioned on its first match as soon as it is built.
pub trait Scorer {
    fn doc(&self) -> DocId;

    /// Moves to the next match.
    fn next(&mut self) -> DocId;

    /// Moves to the first match `>= target`; never moves backwards.
    fn advance(&mut self, target: DocId) -> DocId;

    /// Score of the current document.
    fn score(&mut self) -> f32;

    /// Upper bound on the number of matches, used to order conjunctions.
    fn cost(&self) -> u64;
}

pub type BoxedScorer = Box<dyn Scorer>;

pub struct EmptyScorer;

impl Scorer for EmptyScorer {
    fn doc(&self) -> DocId {
        TERMINATED
    }

    fn next(&mut self) -> DocId {
        TERMINATED
    }

    fn advance(&mut self, _target: DocId) -> DocId {
        TERMINATED
    }

    fn score(&mut self) -> f32 {
        0.0
    }

    fn cost(&self) -> u64 {
        0
    }
}

pub struct TermScorer {
    postings: PostingsIterator,
    weight: Bm25Weight,
    segment: Arc<SegmentReader>,
    field: String,
}

impl TermScorer {
    pub fn new(postings: PostingsIterator, weight: Bm25Weight, segment: Arc<SegmentReader>, field: String) -> Self {
        Self {
            postings,
            weight,
            segment,
            field,
        }
    }
}

impl Scorer for TermScorer {
    fn doc(&self) -> DocId {
        self.postings.doc()
    }

    fn next(&mut self) -> DocId {
        self.postings.next_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.postings.advance(target)
    }

    fn score(&mut self) -> f32 {
        let field_length = self.segment.field_length(&self.field, self.postings.doc());
        self.weight.score(self.postings.term_frequency(), field_length)
    }

    fn cost(&self) -> u64 {
        self.postings.doc_freq() as u64
    }
}

/// Documents where every term occurs at its offset relative to the first one.
/// The term frequency used for scoring is the number of phrase occurrences.
pub struct PhraseScorer {
    // (offset within the phrase, postings), first offset is 0
    postings: Vec<(u32, PostingsIterator)>,
    weight: Bm25Weight,
    segment: Arc<SegmentReader>,
    field: String,
    phrase_freq: u32,
}

impl PhraseScorer {
    pub fn new(
        postings: Vec<(u32, PostingsIterator)>,
        weight: Bm25Weight,
        segment: Arc<SegmentReader>,
        field: String,
    ) -> Self {
        let mut scorer = Self {
            postings,
            weight,
            segment,
            field,
            phrase_freq: 0,
        };
        scorer.find_match();
        scorer
    }

    // Leapfrogs the postings to a common document, then checks positions;
    // repeats until a document holds the phrase.
    fn find_match(&mut self) -> DocId {
        let mut target = self.postings[0].1.doc();
        loop {
            if target == TERMINATED {
                return TERMINATED;
            }
            let mut aligned = true;
            for (_, postings) in self.postings.iter_mut() {
                let doc = postings.advance(target);
                if doc != target {
                    target = doc;
                    aligned = false;
                    break;
                }
            }
            if !aligned {
                continue;
            }
            self.phrase_freq = self.count_phrase_occurrences();
            if self.phrase_freq > 0 {
                return target;
            }
            target = self.postings[0].1.next_doc();
        }
    }

    fn count_phrase_occurrences(&self) -> u32 {
        let (first_offset, first) = &self.postings[0];
        first
            .positions()
            .iter()
            .filter(|&&position| {
                let Some(start) = position.checked_sub(*first_offset) else {
                    return false;
                };
                self.postings[1..]
                    .iter()
                    .all(|(offset, postings)| postings.positions().binary_search(&(start + offset)).is_ok())
            })
            .count() as u32
    }
}

impl Scorer for PhraseScorer {
    fn doc(&self) -> DocId {
        self.postings[0].1.doc()
    }

    fn next(&mut self) -> DocId {
        self.postings[0].1.next_doc();
        self.find_match()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.doc() >= target {
            return self.doc();
        }
        self.postings[0].1.advance(target);
        self.find_match()
    }

    fn score(&mut self) -> f32 {
        let field_length = self.segment.field_length(&self.field, self.doc());
        self.weight.score(self.phrase_freq, field_length)
    }

    fn cost(&self) -> u64 {
        self.postings
            .iter()
            .map(|(_, postings)| postings.doc_freq() as u64)
            .min()
            .unwrap_or(0)
    }
}

/// Documents matched by every sub-scorer; scores are summed.
pub struct ConjunctionScorer {
    scorers: Vec<BoxedScorer>,
}

impl ConjunctionScorer {
    pub fn new(mut scorers: Vec<BoxedScorer>) -> Self {
        // the rarest scorer leads
        scorers.sort_by_key(|scorer| scorer.cost());
        let mut conjunction = Self { scorers };
        let first = conjunction.scorers[0].doc();
        conjunction.align(first);
        conjunction
    }

    fn align(&mut self, mut target: DocId) -> DocId {
        'outer: loop {
            if target == TERMINATED {
                return TERMINATED;
            }
            for scorer in self.scorers.iter_mut() {
                let doc = scorer.advance(target);
                if doc != target {
                    target = doc;
                    continue 'outer;
                }
            }
            return target;
        }
    }
}

impl Scorer for ConjunctionScorer {
    fn doc(&self) -> DocId {
        self.scorers[0].doc()
    }

    fn next(&mut self) -> DocId {
        let target = self.scorers[0].next();
        self.align(target)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.doc() >= target {
            return self.doc();
        }
        let target = self.scorers[0].advance(target);
        self.align(target)
    }

    fn score(&mut self) -> f32 {
        self.scorers.iter_mut().map(|scorer| scorer.score()).sum()
    }

    fn cost(&self) -> u64 {
        self.scorers[0].cost()
    }
}

/// Documents matched by at least one sub-scorer; the scores of every
/// sub-scorer on the document are summed.
pub struct DisjunctionScorer {
    scorers: Vec<BoxedScorer>,
    current_doc: DocId,
}

impl DisjunctionScorer {
    pub fn new(scorers: Vec<BoxedScorer>) -> Self {
        let mut disjunction = Self {
            scorers,
            current_doc: TERMINATED,
        };
        disjunction.update_current();
        disjunction
    }

    fn update_current(&mut self) -> DocId {
        self.scorers.retain(|scorer| scorer.doc() != TERMINATED);
        self.current_doc = self
            .scorers
            .iter()
            .map(|scorer| scorer.doc())
            .min()
            .unwrap_or(TERMINATED);
        self.current_doc
    }
}

impl Scorer for DisjunctionScorer {
    fn doc(&self) -> DocId {
        self.current_doc
    }

    fn next(&mut self) -> DocId {
        if self.current_doc == TERMINATED {
            return TERMINATED;
        }
        let current_doc = self.current_doc;
        for scorer in self.scorers.iter_mut() {
            if scorer.doc() == current_doc {
                scorer.next();
            }
        }
        self.update_current()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.current_doc >= target {
            return self.current_doc;
        }
        for scorer in self.scorers.iter_mut() {
            if scorer.doc() < target {
                scorer.advance(target);
            }
        }
        self.update_current()
    }

    fn score(&mut self) -> f32 {
        let current_doc = self.current_doc;
        self.scorers
            .iter_mut()
            .filter(|scorer| scorer.doc() == current_doc)
            .map(|scorer| scorer.score())
            .sum()
    }

    fn cost(&self) -> u64 {
        self.scorers.iter().map(|scorer| scorer.cost()).sum()
    }
}

/// Matches of `required`; `optional` only adds to the score.
pub struct ReqOptScorer {
    required: BoxedScorer,
    optional: BoxedScorer,
}

impl ReqOptScorer {
    pub fn new(required: BoxedScorer, optional: BoxedScorer) -> Self {
        Self { required, optional }
    }
}

impl Scorer for ReqOptScorer {
    fn doc(&self) -> DocId {
        self.required.doc()
    }

    fn next(&mut self) -> DocId {
        self.required.next()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.required.advance(target)
    }

    fn score(&mut self) -> f32 {
        let doc = self.required.doc();
        let mut score = self.required.score();
        if self.optional.advance(doc) == doc {
            score += self.optional.score();
        }
        score
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}

/// Matches of `required` that `excluded` does not match.
pub struct ReqExclScorer {
    required: BoxedScorer,
    excluded: BoxedScorer,
}

impl ReqExclScorer {
    pub fn new(required: BoxedScorer, excluded: BoxedScorer) -> Self {
        let mut scorer = Self { required, excluded };
        scorer.skip_excluded();
        scorer
    }

    fn skip_excluded(&mut self) -> DocId {
        let mut doc = self.required.doc();
        while doc != TERMINATED && self.excluded.advance(doc) == doc {
            doc = self.required.next();
        }
        doc
    }
}

impl Scorer for ReqExclScorer {
    fn doc(&self) -> DocId {
        self.required.doc()
    }

    fn next(&mut self) -> DocId {
        self.required.next();
        self.skip_excluded()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.required.advance(target);
        self.skip_excluded()
    }

    fn score(&mut self) -> f32 {
        self.required.score()
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}
