use std::io::Read;
use std::path::Path;

use crate::TransferError;
use crate::part_size::PartSize;
use crate::treehash::{Digest, TreeHashState, TreeHasher};

/// One part-sized window of the archive file, already tree-hashed.
#[derive(Debug, Clone)]
pub struct Part {
    /// Zero-based part number.
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw part data.
    pub data: Vec<u8>,
    /// Leaf digests of `data`, in order.
    pub leaves: TreeHashState,
}

impl Part {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tree hash of this part alone.
    pub fn checksum(&self) -> Digest {
        self.leaves.root()
    }
}

/// Reads a file sequentially in part-sized windows, hashing each window.
pub struct PartReader {
    file: std::fs::File,
    part_size: u64,
    offset: u64,
    next_index: u32,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` for windowed reading.
    pub fn open(path: &Path, part_size: PartSize) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            part_size: part_size.bytes(),
            offset: 0,
            next_index: 0,
            file_size,
        })
    }

    /// Reads the next window. Returns `None` at EOF.
    pub fn next_part(&mut self) -> Result<Option<Part>, TransferError> {
        let remaining = self.file_size.saturating_sub(self.offset);
        if remaining == 0 {
            return Ok(None);
        }

        let want = remaining.min(self.part_size);
        let mut data = Vec::with_capacity(want as usize);
        (&mut self.file).take(want).read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }
        if (data.len() as u64) < want {
            // File shrank while being read.
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "expected {want} bytes at offset {}, read {}",
                    self.offset,
                    data.len()
                ),
            )));
        }

        let mut hasher = TreeHasher::new();
        hasher.update(&data);

        let part = Part {
            index: self.next_index,
            offset: self.offset,
            data,
            leaves: hasher.finish_leaves(),
        };
        self.offset += part.len();
        self.next_index += 1;
        Ok(Some(part))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}

/// Reads a whole file and tree-hashes it.
pub fn read_and_hash(path: &Path) -> Result<(Vec<u8>, Digest), TransferError> {
    let data = std::fs::read(path)?;
    let mut hasher = TreeHasher::new();
    hasher.update(&data);
    Ok((data, hasher.digest()))
}
