//! On-demand zip assembly for the MGMS backend.
//!
//! Materializes a single deflate-compressed archive from an ordered list of
//! file descriptors, each naming a local path or a remote HTTP(S) URL.
//! Remote content is fetched concurrently; unavailable entries are silently
//! omitted, and only the aggregate "nothing resolved" case is an error. The
//! caller owns the returned scratch file and deletes it after streaming.

pub mod assembler;
pub mod descriptor;

pub use assembler::ArchiveAssembler;
pub use descriptor::{FileDescriptor, FileSource};

/// Failures of archive assembly.
///
/// The absence of any single source is never fatal; per-file omissions are
/// logged, not surfaced.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Every descriptor was omitted; the archive would have been empty.
    #[error("no sources could be resolved into the archive")]
    NoSourcesResolved,

    /// Scratch file or local read failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container failure.
    #[error("zip error: {0}")]
    Zip(String),
}
