use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::AnalyzerConfig,
    compressor::compressor::CompressionAlgorithm,
    error::{Result, SearchError},
    scoring::bm_25::BM25Params,
};

pub const DEFAULT_CHUNK_SIZE: u16 = 64;
pub const DEFAULT_POSITION_INCREMENT_GAP: u32 = 100;
pub const MAX_POSITION_INCREMENT_GAP: u32 = 1 << 16;

/// Tuning knobs for writing and scoring. Missing keys in a JSON config fall
/// back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Analyzers used when a new index is created. An existing index keeps the
    /// analyzers recorded in its manifest.
    pub analyzers: AnalyzerConfig,
    /// Maximum number of postings per compressed chunk.
    pub chunk_size: u16,
    pub compression: CompressionAlgorithm,
    /// Commit automatically once this many documents are buffered.
    pub max_buffered_docs: Option<usize>,
    /// Commit automatically once the buffer is estimated to hold this many bytes.
    pub max_buffered_bytes: Option<usize>,
    /// Position distance inserted between repeated values of one field.
    pub position_increment_gap: u32,
    pub bm25: BM25Params,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            analyzers: AnalyzerConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression: CompressionAlgorithm::default(),
            max_buffered_docs: None,
            max_buffered_bytes: None,
            position_increment_gap: DEFAULT_POSITION_INCREMENT_GAP,
            bm25: BM25Params::default(),
        }
    }
}

impl IndexConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| SearchError::io(format!("reading config {}", path.display()), e))?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SearchError::Config("chunk_size must be positive".into()));
        }
        if self.bm25.k1.is_nan() || self.bm25.k1 < 0.0 {
            return Err(SearchError::Config("bm25.k1 must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(SearchError::Config("bm25.b must be within [0, 1]".into()));
        }
        if self.position_increment_gap > MAX_POSITION_INCREMENT_GAP {
            return Err(SearchError::Config(format!(
                "position_increment_gap must be at most {}",
                MAX_POSITION_INCREMENT_GAP
            )));
        }
        if self.max_buffered_docs == Some(0) || self.max_buffered_bytes == Some(0) {
            return Err(SearchError::Config("buffer limits must be positive".into()));
        }
        Ok(())
    }
}
