pub mod evaluator;
pub mod parser;
pub mod query_tree;
pub mod scorer;

pub use evaluator::{TopDocs, Weight, evaluate};
pub use parser::parse;
pub use query_tree::{Occur, QueryTree};
