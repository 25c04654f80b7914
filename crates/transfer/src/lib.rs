//! Tree-hashed multipart archive upload.
//!
//! Splits a file into part-sized windows, computes the per-part and
//! whole-archive SHA-256 tree hashes over 1 MiB leaf chunks, and drives
//! the initiate / upload-part / complete handshake against an
//! [`ArchiveService`]. Files smaller than the part size go up in a
//! single request.

mod part_size;
mod progress;
mod reader;
mod service;
mod treehash;
mod types;
mod uploader;

pub use part_size::{DEFAULT_PART_SIZE, MAX_PART_SIZE, MIN_PART_SIZE, PartSize, parse_part_size};
pub use progress::SpeedCalculator;
pub use reader::{Part, PartReader, read_and_hash};
pub use service::{ArchiveService, ServiceError, ServiceFuture};
pub use treehash::{Digest, TreeHashState, TreeHasher, tree_hash};
pub use types::{
    AbortUploadRequest, ByteRange, CompleteUploadRequest, InitiateUploadRequest, TransferResult,
    UploadArchiveRequest, UploadEvent, UploadPartRequest, UploadSession, UploadState,
};
pub use uploader::{ArchiveUploader, archive_description};

/// Leaf chunk size of the tree hash: 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid part size {0}: must be 1 MiB times a power of two, up to 4 GiB")]
    InvalidPartSize(u64),

    #[error("invalid part size {0:?}: expected <digits>, <digits>M or <digits>G")]
    InvalidPartSizeFormat(String),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error(
        "part {index} at offset {offset} is out of order \
         (expected part {expected_index} at offset {expected_offset})"
    )]
    PartOutOfOrder {
        expected_index: u32,
        expected_offset: u64,
        index: u32,
        offset: u64,
    },

    #[error("file read task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    pub(crate) fn remote(operation: &'static str) -> impl FnOnce(ServiceError) -> Self {
        move |source| Self::Remote { operation, source }
    }
}
