use tracing::{debug, warn};

use crate::{
    document::Document,
    error::{Result, SearchError},
    index::reader::IndexReader,
    query::{evaluate, parse, query_tree::QueryTree},
    utils::types::DocAddress,
};

/// One ranked result with the stored values of the matched document.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub address: DocAddress,
    pub score: f32,
    pub document: Document,
}

/// The loaded hits of one search plus the number of live documents that matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub total_hits: u64,
    pub hits: Vec<SearchHit>,
}

/// Parses, evaluates and loads stored fields against one reader snapshot.
#[derive(Debug, Clone)]
pub struct Searcher {
    reader: IndexReader,
}

impl Searcher {
    pub fn new(reader: IndexReader) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn search(&self, query_text: &str, default_fields: &[&str], top_k: usize) -> Result<SearchResults> {
        let tree = parse(query_text, default_fields)?;
        debug!(query = query_text, parsed = %tree, "searching");
        self.search_tree(&tree, top_k)
    }

    /// Hits whose document can no longer be loaded are skipped.
    pub fn search_tree(&self, tree: &QueryTree, top_k: usize) -> Result<SearchResults> {
        let top_docs = evaluate(tree, &self.reader, top_k)?;
        let mut hits = Vec::with_capacity(top_docs.hits.len());
        for (address, score) in top_docs.hits {
            match self.reader.fetch_stored_fields(address) {
                Ok(document) => hits.push(SearchHit {
                    address,
                    score,
                    document,
                }),
                Err(SearchError::NotFound(message)) => {
                    warn!(%address, %message, "skipping stale hit");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(SearchResults {
            total_hits: top_docs.total_hits,
            hits,
        })
    }
}
