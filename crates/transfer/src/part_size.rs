use std::fmt;
use std::str::FromStr;

use crate::TransferError;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Smallest accepted part size: 1 MiB.
pub const MIN_PART_SIZE: u64 = MIB;

/// Largest accepted part size: 4 GiB.
pub const MAX_PART_SIZE: u64 = 4 * GIB;

/// Default part size: 64 MiB.
pub const DEFAULT_PART_SIZE: u64 = 64 * MIB;

/// A validated multipart part size: `1 MiB * 2^k` with `0 <= k <= 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartSize(u64);

impl PartSize {
    /// Validates `bytes` as a part size.
    pub fn new(bytes: u64) -> Result<Self, TransferError> {
        if Self::is_valid(bytes) {
            Ok(Self(bytes))
        } else {
            Err(TransferError::InvalidPartSize(bytes))
        }
    }

    /// Returns `true` if `bytes` is a power-of-two multiple of 1 MiB
    /// between 1 MiB and 4 GiB inclusive.
    pub fn is_valid(bytes: u64) -> bool {
        let mut candidate = MIN_PART_SIZE;
        while candidate <= MAX_PART_SIZE {
            if bytes == candidate {
                return true;
            }
            if bytes < candidate {
                return false;
            }
            candidate *= 2;
        }
        false
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl Default for PartSize {
    fn default() -> Self {
        Self(DEFAULT_PART_SIZE)
    }
}

impl fmt::Display for PartSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % GIB == 0 {
            write!(f, "{}G", self.0 / GIB)
        } else {
            write!(f, "{}M", self.0 / MIB)
        }
    }
}

impl FromStr for PartSize {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_part_size(s)?)
    }
}

/// Converts `<digits>`, `<digits>M` or `<digits>G` to a byte count.
///
/// This only checks the format; use [`PartSize::new`] to validate the size.
pub fn parse_part_size(input: &str) -> Result<u64, TransferError> {
    let format_err = || TransferError::InvalidPartSizeFormat(input.to_string());

    let (digits, multiplier) = match input.as_bytes().last() {
        Some(b'M') => (&input[..input.len() - 1], MIB),
        Some(b'G') => (&input[..input.len() - 1], GIB),
        _ => (input, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format_err());
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(format_err)
}
