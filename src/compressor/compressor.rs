use search_engine_compressors::var_byte;
use serde::{Deserialize, Serialize};

/// How integer lists (doc ids, frequencies, positions) are stored inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    #[default]
    VarByte,
    Uncompressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Compressor {
    compression_algorithm: CompressionAlgorithm,
}

impl Compressor {
    pub fn new(compression_algorithm: CompressionAlgorithm) -> Self {
        Self {
            compression_algorithm,
        }
    }

    pub fn compression_algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    // the input has to be non decreasing
    fn transform_list_for_d_gap_encoding(list: &[u32]) -> Vec<u32> {
        let mut list_with_gaps = Vec::with_capacity(list.len());
        let mut last_member = 0;
        for &member in list {
            list_with_gaps.push(member - last_member);
            last_member = member;
        }
        list_with_gaps
    }

    fn reconstruct_list_from_d_gap_encoding(list_with_gaps: Vec<u32>) -> Option<Vec<u32>> {
        let mut list_without_gaps = Vec::with_capacity(list_with_gaps.len());
        let mut last_member: u32 = 0;
        for gap in list_with_gaps {
            last_member = last_member.checked_add(gap)?;
            list_without_gaps.push(last_member);
        }
        Some(list_without_gaps)
    }

    pub fn compress_list_with_d_gaps(&self, list: &[u32]) -> Vec<u8> {
        self.compress_list(&Self::transform_list_for_d_gap_encoding(list))
    }

    pub fn decompress_list_with_d_gaps(&self, bytes: &[u8]) -> Option<Vec<u32>> {
        Self::reconstruct_list_from_d_gap_encoding(self.decompress_list(bytes)?)
    }

    pub fn compress_list(&self, list: &[u32]) -> Vec<u8> {
        match self.compression_algorithm {
            CompressionAlgorithm::VarByte => var_byte::compress(&list.to_vec()),
            CompressionAlgorithm::Uncompressed => {
                list.iter().flat_map(|value| value.to_le_bytes()).collect()
            }
        }
    }

    pub fn decompress_list(&self, bytes: &[u8]) -> Option<Vec<u32>> {
        match self.compression_algorithm {
            CompressionAlgorithm::VarByte => Some(var_byte::decompress(&bytes.to_vec())),
            CompressionAlgorithm::Uncompressed => {
                if bytes.len() % 4 != 0 {
                    return None;
                }
                Some(
                    bytes
                        .chunks_exact(4)
                        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                )
            }
        }
    }
}
