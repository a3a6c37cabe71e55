use std::sync::Arc;

use crate::{
    document::{Document, Field},
    error::{Result, SearchError},
    utils::{bytes::ByteReader, types::DocId},
};

const ZSTD_LEVEL: i32 = 3;

/*
 Store Layout->
   no_of_docs   u32
   offsets      (no_of_docs + 1) x u64, relative to the start of the blobs
   blobs        one zstd compressed json array of stored fields per document
*/

/// Collects the stored part of each document in doc id order.
#[derive(Debug, Default)]
pub struct StoredFieldsWriter {
    offsets: Vec<u64>,
    blobs: Vec<u8>,
}

impl StoredFieldsWriter {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            blobs: Vec::new(),
        }
    }

    pub fn add_document(&mut self, document: &Document) -> Result<()> {
        let stored: Vec<&Field> = document.fields().iter().filter(|field| field.value.is_stored()).collect();
        let json = serde_json::to_vec(&stored)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
            .map_err(|e| SearchError::io("compressing stored fields", e))?;
        self.add_raw(&compressed);
        Ok(())
    }

    /// Appends an already compressed record, as read by `StoredFieldsReader::raw`.
    pub fn add_raw(&mut self, blob: &[u8]) {
        self.blobs.extend_from_slice(blob);
        self.offsets.push(self.blobs.len() as u64);
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.offsets.len() * 8 + self.blobs.len());
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for offset in &self.offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend(self.blobs);
        out
    }
}

#[derive(Debug, Clone)]
pub struct StoredFieldsReader {
    data: Arc<[u8]>,
    offsets: Vec<u64>,
    blobs_start: usize,
    file_name: String,
}

impl StoredFieldsReader {
    pub fn open(data: Arc<[u8]>, file_name: &str) -> Result<Self> {
        let corrupted = |message: &str| SearchError::corrupted(file_name, message);
        let mut reader = ByteReader::new(&data);
        let no_of_docs = reader.read_u32().ok_or_else(|| corrupted("missing header"))? as usize;
        let mut offsets = Vec::with_capacity((no_of_docs + 1).min(data.len()));
        for _ in 0..=no_of_docs {
            offsets.push(reader.read_u64().ok_or_else(|| corrupted("truncated offsets"))?);
        }
        let blobs_start = reader.offset();
        let blobs_len = (data.len() - blobs_start) as u64;
        if offsets.windows(2).any(|w| w[0] > w[1]) || offsets.last().is_some_and(|&end| end != blobs_len) {
            return Err(corrupted("offsets do not match the stored data"));
        }
        Ok(Self {
            data,
            offsets,
            blobs_start,
            file_name: file_name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The compressed record of `doc_id`.
    pub fn raw(&self, doc_id: DocId) -> Option<&[u8]> {
        let index = doc_id as usize;
        if index >= self.len() {
            return None;
        }
        let start = self.blobs_start + self.offsets[index] as usize;
        let end = self.blobs_start + self.offsets[index + 1] as usize;
        Some(&self.data[start..end])
    }

    pub fn document(&self, doc_id: DocId) -> Result<Document> {
        let raw = self
            .raw(doc_id)
            .ok_or_else(|| SearchError::NotFound(format!("document {} in {}", doc_id, self.file_name)))?;
        let json = zstd::decode_all(raw)
            .map_err(|e| SearchError::corrupted(&self.file_name, format!("doc {}: {}", doc_id, e)))?;
        let fields: Vec<Field> = serde_json::from_slice(&json)
            .map_err(|e| SearchError::corrupted(&self.file_name, format!("doc {}: {}", doc_id, e)))?;
        Ok(Document::from_fields(fields))
    }
}
