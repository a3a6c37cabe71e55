use crate::{
    compressor::compressor::Compressor,
    utils::{bytes::ByteReader, posting::Posting, types::DocId},
};

/*
 A postings list is stored as a run of chunks, each holding at most `chunk_size`
 postings. Chunks are the unit of decompression; the header of every chunk
 carries the largest doc id inside it so a reader can skip a whole chunk
 without decoding it.

 Chunk Layout->
   size_of_chunk   u32  bytes following this field
   no_of_postings  u16
   max_doc_id      u32
   doc_ids         u32 length + d-gap compressed doc ids
   frequencies     u32 length + compressed term frequencies
   positions       u32 length + compressed positions, d-gaps restart per document
*/

pub const CHUNK_SIZE_FIELD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub size_of_chunk: u32,
    pub no_of_postings: u16,
    pub max_doc_id: DocId,
}

impl ChunkHeader {
    /// Total bytes occupied by the chunk including the size field.
    pub fn encoded_len(&self) -> usize {
        CHUNK_SIZE_FIELD + self.size_of_chunk as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub max_doc_id: DocId,
    pub doc_ids: Vec<DocId>,
    pub doc_frequencies: Vec<u32>,
    pub doc_positions: Vec<Vec<u32>>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn reset(&mut self) {
        self.max_doc_id = 0;
        self.doc_ids.clear();
        self.doc_frequencies.clear();
        self.doc_positions.clear();
    }

    pub fn add_posting(&mut self, posting: &Posting) {
        debug_assert!(self.doc_ids.last().is_none_or(|&last| last < posting.doc_id));
        self.max_doc_id = self.max_doc_id.max(posting.doc_id);
        self.doc_ids.push(posting.doc_id);
        self.doc_frequencies.push(posting.term_frequency());
        self.doc_positions.push(posting.positions.clone());
    }

    pub fn posting(&self, index: usize) -> Posting {
        Posting {
            doc_id: self.doc_ids[index],
            positions: self.doc_positions[index].clone(),
        }
    }

    pub fn encode(&self, compressor: &Compressor, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(self.doc_ids.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.max_doc_id.to_le_bytes());

        let doc_ids = compressor.compress_list_with_d_gaps(&self.doc_ids);
        out.extend_from_slice(&(doc_ids.len() as u32).to_le_bytes());
        out.extend(doc_ids);

        let frequencies = compressor.compress_list(&self.doc_frequencies);
        out.extend_from_slice(&(frequencies.len() as u32).to_le_bytes());
        out.extend(frequencies);

        let mut position_gaps = Vec::with_capacity(self.doc_frequencies.iter().sum::<u32>() as usize);
        for positions in &self.doc_positions {
            let mut last_position = 0;
            for &position in positions {
                position_gaps.push(position - last_position);
                last_position = position;
            }
        }
        let positions = compressor.compress_list(&position_gaps);
        out.extend_from_slice(&(positions.len() as u32).to_le_bytes());
        out.extend(positions);

        let size_of_chunk = (out.len() - start - CHUNK_SIZE_FIELD) as u32;
        out[start..start + CHUNK_SIZE_FIELD].copy_from_slice(&size_of_chunk.to_le_bytes());
    }

    pub fn read_header(bytes: &[u8]) -> Option<ChunkHeader> {
        let mut reader = ByteReader::new(bytes);
        let header = ChunkHeader {
            size_of_chunk: reader.read_u32()?,
            no_of_postings: reader.read_u16()?,
            max_doc_id: reader.read_u32()?,
        };
        if header.encoded_len() > bytes.len() {
            return None;
        }
        Some(header)
    }

    /// Decodes a full chunk starting at the beginning of `bytes`.
    pub fn decode(bytes: &[u8], compressor: &Compressor) -> Option<Chunk> {
        let header = Self::read_header(bytes)?;
        let mut reader = ByteReader::new(&bytes[..header.encoded_len()]);
        reader.read_bytes(CHUNK_SIZE_FIELD + 2 + 4)?;

        let doc_ids_len = reader.read_u32()? as usize;
        let doc_ids = compressor.decompress_list_with_d_gaps(reader.read_bytes(doc_ids_len)?)?;
        let frequencies_len = reader.read_u32()? as usize;
        let doc_frequencies = compressor.decompress_list(reader.read_bytes(frequencies_len)?)?;
        let positions_len = reader.read_u32()? as usize;
        let position_gaps = compressor.decompress_list(reader.read_bytes(positions_len)?)?;

        let no_of_postings = header.no_of_postings as usize;
        if doc_ids.len() != no_of_postings || doc_frequencies.len() != no_of_postings {
            return None;
        }
        let total_positions: usize = doc_frequencies.iter().map(|&f| f as usize).sum();
        if position_gaps.len() != total_positions {
            return None;
        }

        let mut doc_positions = Vec::with_capacity(no_of_postings);
        let mut offset = 0;
        for &frequency in &doc_frequencies {
            let mut last_position: u32 = 0;
            let mut positions = Vec::with_capacity(frequency as usize);
            for &gap in &position_gaps[offset..offset + frequency as usize] {
                last_position = last_position.checked_add(gap)?;
                positions.push(last_position);
            }
            offset += frequency as usize;
            doc_positions.push(positions);
        }

        Some(Chunk {
            max_doc_id: header.max_doc_id,
            doc_ids,
            doc_frequencies,
            doc_positions,
        })
    }
}

/// Encodes a whole postings list (sorted by doc id) as consecutive chunks.
/// Returns the encoded bytes and the number of chunks written.
pub fn encode_postings(postings: &[Posting], chunk_size: usize, compressor: &Compressor) -> (Vec<u8>, u32) {
    let mut bytes = Vec::new();
    let mut chunk = Chunk::new();
    let mut no_of_chunks = 0;
    for posting in postings {
        chunk.add_posting(posting);
        if chunk.len() >= chunk_size {
            chunk.encode(compressor, &mut bytes);
            chunk.reset();
            no_of_chunks += 1;
        }
    }
    if !chunk.is_empty() {
        chunk.encode(compressor, &mut bytes);
        no_of_chunks += 1;
    }
    (bytes, no_of_chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::compressor::CompressionAlgorithm;

    fn create_test_posting(doc_id: u32, positions: Vec<u32>) -> Posting {
        Posting { doc_id, positions }
    }

    #[test]
    fn test_encode_and_decode_chunk() {
        let compressor = Compressor::new(CompressionAlgorithm::VarByte);
        let mut chunk = Chunk::new();
        chunk.add_posting(&create_test_posting(0, vec![0, 4, 9]));
        chunk.add_posting(&create_test_posting(7, vec![2]));
        chunk.add_posting(&create_test_posting(300, vec![1, 150, 151]));

        let mut bytes = Vec::new();
        chunk.encode(&compressor, &mut bytes);

        let header = Chunk::read_header(&bytes).unwrap();
        assert_eq!(header.no_of_postings, 3);
        assert_eq!(header.max_doc_id, 300);
        assert_eq!(header.encoded_len(), bytes.len());

        let decoded = Chunk::decode(&bytes, &compressor).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.posting(2), create_test_posting(300, vec![1, 150, 151]));
    }

    #[test]
    fn test_truncated_chunk_is_rejected() {
        let compressor = Compressor::new(CompressionAlgorithm::VarByte);
        let (bytes, _) = encode_postings(&[create_test_posting(3, vec![1])], 4, &compressor);
        assert!(Chunk::decode(&bytes[..bytes.len() - 1], &compressor).is_none());
        assert!(Chunk::read_header(&bytes[..3]).is_none());
    }

    #[test]
    fn test_encode_postings_splits_into_chunks() {
        let compressor = Compressor::new(CompressionAlgorithm::Uncompressed);
        let postings: Vec<Posting> = (0..10).map(|i| create_test_posting(i * 2, vec![i])).collect();
        let (bytes, no_of_chunks) = encode_postings(&postings, 4, &compressor);
        assert_eq!(no_of_chunks, 3);

        let first = Chunk::read_header(&bytes).unwrap();
        assert_eq!(first.no_of_postings, 4);
        assert_eq!(first.max_doc_id, 6);
        let second = Chunk::read_header(&bytes[first.encoded_len()..]).unwrap();
        assert_eq!(second.max_doc_id, 14);
    }
}
