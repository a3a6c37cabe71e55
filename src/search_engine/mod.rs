pub mod search_engine;

pub use search_engine::{IndexMetadata, SearchEngine};
