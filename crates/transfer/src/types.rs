use std::fmt;

use crate::TransferError;
use crate::part_size::PartSize;
use crate::treehash::TreeHashState;

/// Result of a successful archive upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    location: String,
    archive_id: String,
    checksum: String,
}

impl TransferResult {
    pub fn new(location: String, archive_id: String, checksum: String) -> Self {
        Self {
            location,
            archive_id,
            checksum,
        }
    }

    /// Relative URI of the stored archive.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn archive_id(&self) -> &str {
        &self.archive_id
    }

    /// Hex tree hash reported by the service.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

/// Inclusive byte range of one part within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering `len` bytes from `offset`. `len` must be non-zero.
    pub fn new(offset: u64, len: u64) -> Self {
        debug_assert!(len > 0, "empty byte range");
        Self {
            start: offset,
            end: offset + len - 1,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/*", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// InitiateUpload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateUploadRequest {
    pub vault: String,
    pub description: String,
    pub part_size: u64,
}

/// UploadPart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPartRequest {
    pub vault: String,
    pub upload_id: String,
    pub checksum: String,
    pub range: ByteRange,
    pub body: Vec<u8>,
}

/// CompleteUpload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteUploadRequest {
    pub vault: String,
    pub upload_id: String,
    pub archive_size: u64,
    pub checksum: String,
}

/// Single-shot UploadArchive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadArchiveRequest {
    pub vault: String,
    pub description: String,
    pub checksum: String,
    pub body: Vec<u8>,
}

/// AbortUpload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortUploadRequest {
    pub vault: String,
    pub upload_id: String,
}

/// Lifecycle of a multipart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Initiated,
    Uploading { offset: u64 },
    Completed,
    Failed,
}

/// Progress event emitted by the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started {
        description: String,
        total_bytes: u64,
        multipart: bool,
    },
    PartUploaded {
        index: u32,
        range: ByteRange,
        uploaded_bytes: u64,
        total_bytes: u64,
    },
    Completed {
        archive_id: String,
    },
    Failed {
        error: String,
    },
}

/// State of one multipart upload, owned by a single uploader call.
#[derive(Debug)]
pub struct UploadSession {
    vault: String,
    description: String,
    part_size: PartSize,
    upload_id: String,
    offset: u64,
    next_index: u32,
    archive_hash: TreeHashState,
    state: UploadState,
}

impl UploadSession {
    /// Creates a session for an upload the service has just initiated.
    pub fn new(vault: String, description: String, part_size: PartSize, upload_id: String) -> Self {
        Self {
            vault,
            description,
            part_size,
            upload_id,
            offset: 0,
            next_index: 0,
            archive_hash: TreeHashState::new(),
            state: UploadState::Initiated,
        }
    }

    /// Records an uploaded part: appends its leaves to the archive hash and
    /// advances the offset.
    ///
    /// Parts must arrive in file order, each starting where the previous
    /// one ended.
    pub fn record_part(
        &mut self,
        index: u32,
        offset: u64,
        len: u64,
        leaves: &TreeHashState,
    ) -> Result<(), TransferError> {
        if index != self.next_index || offset != self.offset {
            return Err(TransferError::PartOutOfOrder {
                expected_index: self.next_index,
                expected_offset: self.offset,
                index,
                offset,
            });
        }
        self.archive_hash.append(leaves);
        self.offset += len;
        self.next_index += 1;
        self.state = UploadState::Uploading {
            offset: self.offset,
        };
        Ok(())
    }

    /// Hex root of every leaf recorded so far.
    pub fn archive_checksum(&self) -> String {
        self.archive_hash.root().to_hex()
    }

    pub fn complete(&mut self) {
        self.state = UploadState::Completed;
    }

    pub fn fail(&mut self) {
        self.state = UploadState::Failed;
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn part_size(&self) -> PartSize {
        self.part_size
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Bytes recorded so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn parts_uploaded(&self) -> u32 {
        self.next_index
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }
}
