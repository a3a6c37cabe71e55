pub mod chunk;
pub mod postings_iterator;
pub mod term_dictionary;

pub use postings_iterator::PostingsIterator;
pub use term_dictionary::{Term, TermDictionary, TermInfo};
