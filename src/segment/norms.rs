use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::{
    compressor::compressor::{CompressionAlgorithm, Compressor},
    error::{Result, SearchError},
    utils::{
        bytes::{ByteReader, write_string},
        types::DocId,
    },
};

/// Token counts of one field for every document of a segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldNorms {
    pub lengths: Vec<u32>,
    /// Sum of all lengths.
    pub total_length: u64,
    /// Documents with at least one value for the field.
    pub doc_count: u32,
}

impl FieldNorms {
    pub fn from_lengths(lengths: Vec<u32>) -> Self {
        Self {
            total_length: lengths.iter().map(|&length| length as u64).sum(),
            doc_count: lengths.iter().filter(|&&length| length > 0).count() as u32,
            lengths,
        }
    }
}

/*
 Norms Layout->
   no_of_fields  u32
   per field, sorted by name:
     field       u32 length + utf-8
     lengths     u32 length + var-byte compressed token counts, one per doc
*/
pub fn encode_norms(fields: &BTreeMap<String, Vec<u32>>) -> Vec<u8> {
    let compressor = Compressor::new(CompressionAlgorithm::VarByte);
    let mut out = Vec::new();
    out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for (field, lengths) in fields {
        write_string(&mut out, field);
        let compressed = compressor.compress_list(lengths);
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend(compressed);
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct NormsReader {
    fields: FxHashMap<String, FieldNorms>,
}

impl NormsReader {
    pub fn decode(bytes: &[u8], max_doc: u32, file_name: &str) -> Result<Self> {
        let compressor = Compressor::new(CompressionAlgorithm::VarByte);
        let corrupted = || SearchError::corrupted(file_name, "truncated norms");
        let mut reader = ByteReader::new(bytes);
        let no_of_fields = reader.read_u32().ok_or_else(corrupted)?;
        let mut fields = FxHashMap::default();
        for _ in 0..no_of_fields {
            let field = reader.read_string().ok_or_else(corrupted)?;
            let len = reader.read_u32().ok_or_else(corrupted)? as usize;
            let lengths = compressor
                .decompress_list(reader.read_bytes(len).ok_or_else(corrupted)?)
                .ok_or_else(corrupted)?;
            if lengths.len() != max_doc as usize {
                return Err(SearchError::corrupted(
                    file_name,
                    format!("field {} has {} lengths for {} documents", field, lengths.len(), max_doc),
                ));
            }
            fields.insert(field, FieldNorms::from_lengths(lengths));
        }
        Ok(Self { fields })
    }

    pub fn field(&self, field: &str) -> Option<&FieldNorms> {
        self.fields.get(field)
    }

    /// Zero for documents without the field.
    pub fn field_length(&self, field: &str, doc_id: DocId) -> u32 {
        self.fields
            .get(field)
            .and_then(|norms| norms.lengths.get(doc_id as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldNorms)> {
        self.fields.iter()
    }
}
