pub mod bytes;
pub mod paths;
pub mod posting;
pub mod types;
