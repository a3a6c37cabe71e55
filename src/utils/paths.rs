use crate::utils::types::SegmentId;

pub const MANIFEST_FILE: &str = "segments.json";
pub const WRITE_LOCK_FILE: &str = "write.lock";
pub const TEMP_SUFFIX: &str = ".tmp";
const SEGMENT_FILE_PREFIX: &str = "seg_";

/// The files making up one immutable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentComponent {
    Terms,
    Postings,
    Store,
    Norms,
}

impl SegmentComponent {
    pub const ALL: [SegmentComponent; 4] = [
        SegmentComponent::Terms,
        SegmentComponent::Postings,
        SegmentComponent::Store,
        SegmentComponent::Norms,
    ];

    fn extension(self) -> &'static str {
        match self {
            SegmentComponent::Terms => "terms",
            SegmentComponent::Postings => "postings",
            SegmentComponent::Store => "store",
            SegmentComponent::Norms => "norms",
        }
    }
}

pub fn get_segment_file_name(segment_id: SegmentId, component: SegmentComponent) -> String {
    format!(
        "{}{}.{}",
        SEGMENT_FILE_PREFIX,
        segment_id,
        component.extension()
    )
}

pub fn get_deletes_file_name(segment_id: SegmentId, generation: u64) -> String {
    format!("{}{}_{}.del", SEGMENT_FILE_PREFIX, segment_id, generation)
}

/// Files the index owns and may garbage collect when they are no longer referenced.
pub fn is_index_file(name: &str) -> bool {
    name.starts_with(SEGMENT_FILE_PREFIX) || name.ends_with(TEMP_SUFFIX)
}

pub fn get_temp_file_name(name: &str) -> String {
    format!("{}{}", name, TEMP_SUFFIX)
}
