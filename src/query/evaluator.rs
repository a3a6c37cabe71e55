use std::sync::Arc;

use tracing::debug;

use crate::{
    analysis::{AnalyzerKind, IndexedAs},
    error::Result,
    index::reader::IndexReader,
    postings::Term,
    query::{
        query_tree::{Occur, QueryTree},
        scorer::{
            BoxedScorer, ConjunctionScorer, DisjunctionScorer, EmptyScorer, PhraseScorer, ReqExclScorer,
            ReqOptScorer, TermScorer,
        },
    },
    ranker::TopKCollector,
    scoring::bm_25::Bm25Weight,
    segment::SegmentReader,
    utils::types::{DocAddress, TERMINATED},
};

/// Upper bound on the number of terms a prefix query expands to.
pub const MAX_PREFIX_EXPANSIONS: usize = 1024;

/// A query tree resolved against one reader snapshot: text is analyzed and
/// BM25 statistics are computed over every segment. A `Weight` builds one
/// scorer per segment.
#[derive(Debug, Clone)]
pub enum Weight {
    /// Matches nothing.
    Empty,
    Term {
        term: Term,
        bm25: Bm25Weight,
    },
    Phrase {
        field: String,
        // (offset from the first token, term)
        terms: Vec<(u32, Term)>,
        bm25: Bm25Weight,
    },
    Boolean {
        must: Vec<Weight>,
        should: Vec<Weight>,
        must_not: Vec<Weight>,
    },
}

impl Weight {
    pub fn is_empty(&self) -> bool {
        matches!(self, Weight::Empty)
    }

    pub fn compile(tree: &QueryTree, reader: &IndexReader) -> Result<Weight> {
        match tree {
            QueryTree::Term { field, text } | QueryTree::Phrase { field, text } => {
                Ok(Self::compile_text(field, text, reader))
            }
            QueryTree::Prefix { field, prefix } => Ok(Self::compile_prefix(field, prefix, reader)),
            QueryTree::Boolean(clauses) => Self::compile_boolean(clauses, reader),
        }
    }

    fn compile_text(field: &str, text: &str, reader: &IndexReader) -> Weight {
        let Some(indexed_as) = checked_field(field, reader) else {
            return Weight::Empty;
        };
        let tokens = reader.analyzers().analyze(field, indexed_as, text);
        let Some(first) = tokens.first() else {
            debug!(field, text, "query text analyzed to no tokens");
            return Weight::Empty;
        };
        if tokens.len() == 1 {
            return term_weight(Term::new(field, &first.word), reader);
        }

        let first_position = first.position;
        let mut terms = Vec::with_capacity(tokens.len());
        let mut doc_freqs = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let term = Term::new(field, &token.word);
            let doc_freq = clamp_u32(reader.doc_freq(&term));
            if doc_freq == 0 {
                return Weight::Empty;
            }
            doc_freqs.push(doc_freq);
            terms.push((token.position - first_position, term));
        }
        let bm25 = Bm25Weight::for_phrase(
            &doc_freqs,
            clamp_u32(reader.max_doc()),
            reader.average_field_length(field),
            reader.index().config().bm25,
        );
        Weight::Phrase {
            field: field.to_string(),
            terms,
            bm25,
        }
    }

    fn compile_prefix(field: &str, prefix: &str, reader: &IndexReader) -> Weight {
        let Some(indexed_as) = checked_field(field, reader) else {
            return Weight::Empty;
        };
        let prefix = match (indexed_as, reader.analyzers().config().kind_for(field)) {
            (IndexedAs::Text, AnalyzerKind::Standard | AnalyzerKind::Simple) => prefix.to_lowercase(),
            _ => prefix.to_string(),
        };
        let mut expansions = reader.terms_with_prefix(field, &prefix);
        if expansions.len() > MAX_PREFIX_EXPANSIONS {
            debug!(field, prefix = %prefix, count = expansions.len(), "prefix expansion truncated");
            expansions.truncate(MAX_PREFIX_EXPANSIONS);
        }
        let should: Vec<Weight> = expansions
            .into_iter()
            .map(|text| term_weight(Term::new(field, text), reader))
            .filter(|weight| !weight.is_empty())
            .collect();
        match should.len() {
            0 => Weight::Empty,
            1 => should.into_iter().next().unwrap_or(Weight::Empty),
            _ => Weight::Boolean {
                must: Vec::new(),
                should,
                must_not: Vec::new(),
            },
        }
    }

    fn compile_boolean(clauses: &[(Occur, QueryTree)], reader: &IndexReader) -> Result<Weight> {
        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        for (occur, clause) in clauses {
            let weight = Self::compile(clause, reader)?;
            match (occur, weight.is_empty()) {
                (Occur::Must, true) => return Ok(Weight::Empty),
                (_, true) => {}
                (Occur::Must, false) => must.push(weight),
                (Occur::Should, false) => should.push(weight),
                (Occur::MustNot, false) => must_not.push(weight),
            }
        }
        if must.is_empty() && should.is_empty() {
            return Ok(Weight::Empty);
        }
        if must.is_empty() && must_not.is_empty() && should.len() == 1 {
            return Ok(should.pop().unwrap_or(Weight::Empty));
        }
        Ok(Weight::Boolean { must, should, must_not })
    }

    /// A scorer over one segment, positioned on its first match.
    pub fn scorer(&self, segment: &Arc<SegmentReader>) -> BoxedScorer {
        match self {
            Weight::Empty => Box::new(EmptyScorer),
            Weight::Term { term, bm25 } => match segment.term_info(term) {
                Some(info) => Box::new(TermScorer::new(
                    segment.postings_for(info),
                    *bm25,
                    Arc::clone(segment),
                    term.field.clone(),
                )),
                None => Box::new(EmptyScorer),
            },
            Weight::Phrase { field, terms, bm25 } => {
                let mut postings = Vec::with_capacity(terms.len());
                for (offset, term) in terms {
                    let Some(info) = segment.term_info(term) else {
                        return Box::new(EmptyScorer);
                    };
                    postings.push((*offset, segment.postings_for(info)));
                }
                Box::new(PhraseScorer::new(postings, *bm25, Arc::clone(segment), field.clone()))
            }
            Weight::Boolean { must, should, must_not } => {
                let mut must_scorers = Vec::with_capacity(must.len());
                for weight in must {
                    let scorer = weight.scorer(segment);
                    if scorer.doc() == TERMINATED {
                        return Box::new(EmptyScorer);
                    }
                    must_scorers.push(scorer);
                }
                let should_scorers = live_scorers(should, segment);
                let must_not_scorers = live_scorers(must_not, segment);

                let required: BoxedScorer = match (must_scorers.len(), should_scorers.is_empty()) {
                    (0, true) => return Box::new(EmptyScorer),
                    (0, false) => Box::new(DisjunctionScorer::new(should_scorers)),
                    (_, should_empty) => {
                        let conjunction: BoxedScorer = if must_scorers.len() == 1 {
                            must_scorers.remove(0)
                        } else {
                            Box::new(ConjunctionScorer::new(must_scorers))
                        };
                        if should_empty {
                            conjunction
                        } else {
                            Box::new(ReqOptScorer::new(
                                conjunction,
                                Box::new(DisjunctionScorer::new(should_scorers)),
                            ))
                        }
                    }
                };
                if must_not_scorers.is_empty() {
                    return required;
                }
                Box::new(ReqExclScorer::new(
                    required,
                    Box::new(DisjunctionScorer::new(must_not_scorers)),
                ))
            }
        }
    }
}

fn checked_field(field: &str, reader: &IndexReader) -> Option<IndexedAs> {
    match reader.check_field(field) {
        Ok(indexed_as) => Some(indexed_as),
        Err(err) => {
            debug!(field, %err, "query field is not indexed; clause matches nothing");
            None
        }
    }
}

fn term_weight(term: Term, reader: &IndexReader) -> Weight {
    let doc_freq = clamp_u32(reader.doc_freq(&term));
    if doc_freq == 0 {
        return Weight::Empty;
    }
    let bm25 = Bm25Weight::for_term(
        doc_freq,
        clamp_u32(reader.max_doc()),
        reader.average_field_length(&term.field),
        reader.index().config().bm25,
    );
    Weight::Term { term, bm25 }
}

fn live_scorers(weights: &[Weight], segment: &Arc<SegmentReader>) -> Vec<BoxedScorer> {
    weights
        .iter()
        .map(|weight| weight.scorer(segment))
        .filter(|scorer| scorer.doc() != TERMINATED)
        .collect()
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// The best-ranked documents of one evaluation and how many matched in all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    pub total_hits: u64,
    pub hits: Vec<(DocAddress, f32)>,
}

/// Ranks the live documents of `reader` matching `tree`: best `top_k` first,
/// ties broken by ascending address. `total_hits` counts every live match.
pub fn evaluate(tree: &QueryTree, reader: &IndexReader, top_k: usize) -> Result<TopDocs> {
    let weight = Weight::compile(tree, reader)?;
    if weight.is_empty() {
        debug!(query = %tree, "query matches nothing");
        return Ok(TopDocs::default());
    }

    let mut collector = TopKCollector::new(top_k);
    for entry in reader.segments() {
        let mut scorer = weight.scorer(&entry.reader);
        let mut doc = scorer.doc();
        while doc != TERMINATED {
            if !entry.is_deleted(doc) {
                collector.push(DocAddress::new(entry.segment_id(), doc), scorer.score());
            }
            doc = scorer.next();
        }
    }
    let total_hits = collector.total_hits();
    debug!(query = %tree, total_hits, "query evaluated");

    Ok(TopDocs {
        total_hits,
        hits: collector
            .into_sorted_vec()
            .into_iter()
            .map(|scored| (scored.address, scored.score))
            .collect(),
    })
}
