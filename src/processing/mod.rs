pub mod archive;

pub use archive::{build_archive, ArchiveEntry};
