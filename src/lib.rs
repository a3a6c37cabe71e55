pub mod analysis;
pub mod compressor;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod index;
pub mod postings;
pub mod query;
pub mod ranker;
pub mod scoring;
pub mod search_engine;
pub mod segment;
pub mod utils;

pub use config::IndexConfig;
pub use document::{Document, Field, FieldValue};
pub use error::{Result, SearchError};
pub use index::{Index, IndexReader, IndexWriter, OpenMode, SearchHit, SearchResults, Searcher};
pub use query::{QueryTree, TopDocs, evaluate, parse};
pub use utils::types::{DocAddress, DocId, DocumentId, SegmentId};
