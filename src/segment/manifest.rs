use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalyzerConfig, IndexedAs},
    compressor::compressor::CompressionAlgorithm,
    directory::Directory,
    error::{Result, SearchError},
    utils::{
        paths::{MANIFEST_FILE, SegmentComponent, get_deletes_file_name, get_segment_file_name},
        types::SegmentId,
    },
};

pub const MANIFEST_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub segment_id: SegmentId,
    /// Number of documents written into the segment, deleted ones included.
    pub max_doc: u32,
    pub deleted_docs: u32,
    /// Generation of the deletion file, if any document has been deleted.
    pub delete_generation: Option<u64>,
    pub compression: CompressionAlgorithm,
}

impl SegmentMeta {
    pub fn num_docs(&self) -> u32 {
        self.max_doc - self.deleted_docs
    }

    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = SegmentComponent::ALL
            .iter()
            .map(|&component| get_segment_file_name(self.segment_id, component))
            .collect();
        if let Some(generation) = self.delete_generation {
            files.push(get_deletes_file_name(self.segment_id, generation));
        }
        files
    }
}

/// The list of live segments. Every successful commit writes a new manifest
/// with a higher generation; replacing this file is the commit point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: u64,
    pub next_segment_id: u64,
    pub segments: Vec<SegmentMeta>,
    pub analyzers: AnalyzerConfig,
    /// How every field ever indexed was written.
    pub schema: BTreeMap<String, IndexedAs>,
}

impl Manifest {
    pub fn new(analyzers: AnalyzerConfig) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            generation: 0,
            next_segment_id: 1,
            segments: Vec::new(),
            analyzers,
            schema: BTreeMap::new(),
        }
    }

    /// `None` when the directory holds no index yet.
    pub fn load(directory: &dyn Directory) -> Result<Option<Manifest>> {
        let bytes = match directory.read(MANIFEST_FILE) {
            Ok(bytes) => bytes,
            Err(e) if e.is_missing_file() => return Ok(None),
            Err(e) => return Err(e),
        };
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::corrupted(MANIFEST_FILE, e.to_string()))?;
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(SearchError::corrupted(
                MANIFEST_FILE,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        Ok(Some(manifest))
    }

    pub fn save(&self, directory: &dyn Directory) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        directory.atomic_write(MANIFEST_FILE, &bytes)
    }

    pub fn allocate_segment_id(&mut self) -> SegmentId {
        let segment_id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;
        segment_id
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&SegmentMeta> {
        self.segments.iter().find(|meta| meta.segment_id == segment_id)
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|meta| meta.num_docs() as u64).sum()
    }

    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|meta| meta.max_doc as u64).sum()
    }

    /// Every file a reader of this manifest may open.
    pub fn referenced_files(&self) -> FxHashSet<String> {
        self.segments.iter().flat_map(SegmentMeta::files).collect()
    }
}
