pub mod document;
pub mod passage;

pub use document::{Document, DocumentBuilder, Field, FieldValue};
