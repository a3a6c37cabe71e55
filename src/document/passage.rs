use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use bzip2::read::BzDecoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    document::document::Document,
    error::{Result, SearchError},
};

pub const IS_SELECTED: &str = "is_selected";
pub const URL: &str = "url";
pub const PASSAGE_TEXT: &str = "passage_text";
pub const PASSAGE_ID: &str = "passage_ID";
pub const QUERY_ID: &str = "query_id";
pub const QUERY_TYPE: &str = "query_type";
pub const QUERY: &str = "query";
pub const ANSWERS: &str = "answers";

/// Fields searched when the caller does not name any.
pub const DEFAULT_SEARCH_FIELDS: [&str; 5] = [URL, PASSAGE_TEXT, QUERY_ID, QUERY, ANSWERS];

// Record shape of the passage collection dump
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Passage {
    #[serde(default)]
    pub is_selected: i64,
    #[serde(default)]
    pub url: String,
    pub passage_text: String,
    #[serde(rename = "passage_ID")]
    pub passage_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PassageCollection {
    #[serde(default)]
    pub passages: Vec<Passage>,
    pub query_id: i64,
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default)]
    pub query_type: String,
    pub query: String,
}

impl Passage {
    pub fn to_document(&self) -> Document {
        Document::builder()
            .token(PASSAGE_ID, self.passage_id.to_string())
            .token(IS_SELECTED, self.is_selected.to_string())
            .text(URL, self.url.as_str())
            .text(PASSAGE_TEXT, self.passage_text.as_str())
            .build()
    }
}

impl PassageCollection {
    pub fn query_document(&self) -> Document {
        let mut builder = Document::builder()
            .token(QUERY_ID, self.query_id.to_string())
            .text(QUERY_TYPE, self.query_type.as_str())
            .text(QUERY, self.query.as_str());
        for answer in &self.answers {
            builder = builder.text(ANSWERS, answer.as_str());
        }
        builder.build()
    }

    /// One document per passage followed by the query document. Each one is
    /// built from scratch, so no field of one document can leak into another.
    pub fn documents(&self) -> Vec<Document> {
        let mut documents: Vec<Document> =
            self.passages.iter().map(Passage::to_document).collect();
        documents.push(self.query_document());
        documents
    }
}

/// Reads a stream of concatenated JSON objects. Files ending in `.bz2` are
/// decompressed on the fly.
pub fn read_passage_collections<P: AsRef<Path>>(path: P) -> Result<Vec<PassageCollection>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SearchError::io(format!("opening {}", path.display()), e))?;
    let reader: Box<dyn Read> = if path.extension().and_then(|s| s.to_str()) == Some("bz2") {
        Box::new(BzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let collections = parse_passage_collections(BufReader::new(reader))?;
    debug!(
        path = %path.display(),
        collections = collections.len(),
        "read passage collections"
    );
    Ok(collections)
}

pub fn parse_passage_collections<R: Read>(reader: R) -> Result<Vec<PassageCollection>> {
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<PassageCollection>();
    let mut collections = Vec::new();
    for result in stream {
        collections.push(result?);
    }
    Ok(collections)
}
