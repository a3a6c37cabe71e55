pub mod index;
pub mod reader;
pub mod searcher;
pub mod writer;

pub use index::Index;
pub use reader::{IndexReader, SegmentEntry};
pub use searcher::{SearchHit, SearchResults, Searcher};
pub use writer::{IndexWriter, OpenMode};
