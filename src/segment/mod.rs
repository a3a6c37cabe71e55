pub mod buffer;
pub mod deletes;
pub mod manifest;
pub mod merger;
pub mod norms;
pub mod segment_reader;
pub mod segment_writer;
pub mod stored_fields;

pub use manifest::{Manifest, SegmentMeta};
pub use segment_reader::SegmentReader;
