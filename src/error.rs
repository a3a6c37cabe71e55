use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("io error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("field {field} has never been indexed")]
    SchemaMismatch { field: String },

    #[error("field {field} is indexed as {existing}, cannot index it as {requested}")]
    SchemaConflict {
        field: String,
        existing: String,
        requested: String,
    },

    #[error("positions of field {field} exceed the u32 range")]
    PositionOverflow { field: String },

    #[error("corrupted index file {file}: {message}")]
    Corrupted { file: String, message: String },

    #[error("index is locked by another writer: {0}")]
    LockHeld(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SearchError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn query_syntax(position: usize, message: impl Into<String>) -> Self {
        SearchError::QuerySyntax {
            position,
            message: message.into(),
        }
    }

    pub fn corrupted(file: impl Into<String>, message: impl Into<String>) -> Self {
        SearchError::Corrupted {
            file: file.into(),
            message: message.into(),
        }
    }

    /// True for storage errors caused by a file that does not exist (anymore).
    pub fn is_missing_file(&self) -> bool {
        matches!(self, SearchError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
