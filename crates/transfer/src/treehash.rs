//! SHA-256 tree hash over 1 MiB leaf chunks.
//!
//! Leaves are hashed individually, then adjacent digests are paired
//! left-to-right (`sha256(left || right)`) level by level until a single
//! root remains. A trailing unpaired digest is promoted to the next level
//! unchanged.

use std::fmt;

use sha2::{Digest as _, Sha256};

use crate::CHUNK_SIZE;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Hashes `data` with SHA-256.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hashes the concatenation `left || right`.
    fn combine(left: &Digest, right: &Digest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, as sent in checksum headers.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Ordered leaf digests, one per chunk, in file order.
///
/// A part's state can be appended to an archive-wide state as long as
/// every part but the last ends on a chunk boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeHashState {
    leaves: Vec<Digest>,
}

impl TreeHashState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `other`'s leaves after this state's leaves.
    pub fn append(&mut self, other: &TreeHashState) {
        self.leaves.extend_from_slice(&other.leaves);
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Reduces the leaves to the root digest.
    ///
    /// An empty state is treated as a single empty leaf, so the root of
    /// zero bytes is `sha256("")`.
    pub fn root(&self) -> Digest {
        if self.leaves.is_empty() {
            return Digest::of(&[]);
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Digest::combine(left, right),
                    [odd] => *odd,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
        }
        level[0]
    }

    fn push(&mut self, leaf: Digest) {
        self.leaves.push(leaf);
    }
}

/// Incremental tree hasher.
///
/// Chunk boundaries are fixed at multiples of [`CHUNK_SIZE`] from the
/// first byte fed, independent of how input is split across `update`
/// calls. Finalizing consumes the hasher.
#[derive(Debug, Clone)]
pub struct TreeHasher {
    pending: Vec<u8>,
    state: TreeHashState,
}

impl Default for TreeHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeHasher {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(CHUNK_SIZE),
            state: TreeHashState::new(),
        }
    }

    /// Feeds more bytes.
    pub fn update(&mut self, mut data: &[u8]) {
        // Complete a partially filled chunk first.
        if !self.pending.is_empty() {
            let take = (CHUNK_SIZE - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() < CHUNK_SIZE {
                return;
            }
            self.state.push(Digest::of(&self.pending));
            self.pending.clear();
        }

        // Hash whole chunks straight from the input.
        let mut chunks = data.chunks_exact(CHUNK_SIZE);
        for chunk in &mut chunks {
            self.state.push(Digest::of(chunk));
        }
        self.pending.extend_from_slice(chunks.remainder());
    }

    /// Finalizes and returns the leaf digests without reducing them.
    pub fn finish_leaves(mut self) -> TreeHashState {
        if !self.pending.is_empty() {
            self.state.push(Digest::of(&self.pending));
        }
        self.state
    }

    /// Finalizes and returns the root digest.
    pub fn digest(self) -> Digest {
        self.finish_leaves().root()
    }
}

/// One-shot tree hash of `data`.
pub fn tree_hash(data: &[u8]) -> Digest {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = CHUNK_SIZE;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn sha(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn sha_pair(a: [u8; 32], b: [u8; 32]) -> [u8; 32] {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);
        sha(&buf)
    }

    #[test]
    fn empty_input_is_hash_of_empty_leaf() {
        let digest = tree_hash(&[]);
        assert_eq!(
            digest.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(TreeHasher::new().finish_leaves().is_empty());
    }

    #[test]
    fn small_input_is_plain_sha256() {
        let data = b"hello glacier";
        assert_eq!(tree_hash(data).as_bytes(), &sha(data));
    }

    #[test]
    fn exactly_one_chunk_is_plain_sha256() {
        let data = sample(MIB);
        assert_eq!(tree_hash(&data).as_bytes(), &sha(&data));
    }

    #[test]
    fn two_chunks_are_paired() {
        let data = sample(MIB + 10);
        let expected = sha_pair(sha(&data[..MIB]), sha(&data[MIB..]));
        assert_eq!(tree_hash(&data).as_bytes(), &expected);
    }

    #[test]
    fn odd_leaf_is_carried_up() {
        let data = sample(3 * MIB);
        let h0 = sha(&data[..MIB]);
        let h1 = sha(&data[MIB..2 * MIB]);
        let h2 = sha(&data[2 * MIB..]);
        let expected = sha_pair(sha_pair(h0, h1), h2);
        assert_eq!(tree_hash(&data).as_bytes(), &expected);
    }

    #[test]
    fn five_leaves_reduce_in_three_levels() {
        let leaves: Vec<[u8; 32]> = (0u8..5).map(|i| sha(&[i])).collect();
        let mut state = TreeHashState::new();
        for leaf in &leaves {
            state.push(Digest::from(*leaf));
        }
        let level1 = [
            sha_pair(leaves[0], leaves[1]),
            sha_pair(leaves[2], leaves[3]),
            leaves[4],
        ];
        let level2 = [sha_pair(level1[0], level1[1]), level1[2]];
        let root = sha_pair(level2[0], level2[1]);
        assert_eq!(state.root().as_bytes(), &root);
    }

    #[test]
    fn update_split_does_not_move_chunk_boundaries() {
        let data = sample(2 * MIB + 12345);
        let whole = tree_hash(&data);

        for split in [0, 1, 4096, MIB - 1, MIB, MIB + 1, 2 * MIB + 12345] {
            let mut hasher = TreeHasher::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.digest(), whole, "split at {split}");
        }
    }

    #[test]
    fn many_small_updates_match_one_update() {
        let data = sample(MIB + 777);
        let mut hasher = TreeHasher::new();
        for piece in data.chunks(1000) {
            hasher.update(piece);
        }
        assert_eq!(hasher.digest(), tree_hash(&data));
    }

    #[test]
    fn appended_part_states_match_whole_file() {
        let data = sample(5 * MIB + 3);
        let mut archive = TreeHashState::new();
        for part in data.chunks(2 * MIB) {
            let mut hasher = TreeHasher::new();
            hasher.update(part);
            archive.append(&hasher.finish_leaves());
        }
        assert_eq!(archive.len(), 6);
        assert_eq!(archive.root(), tree_hash(&data));
    }

    #[test]
    fn digest_formats_as_lowercase_hex() {
        let digest = Digest::from([0xABu8; 32]);
        assert_eq!(digest.to_string(), "ab".repeat(32));
        assert!(format!("{digest:?}").starts_with("Digest(abab"));
    }
}
