//! Binary Merkle tree over an ordered list of artifact hashes.
//!
//! Adjacent hashes are paired and combined with [`Hash::chain`]. An unpaired
//! trailing hash is promoted to the next level unchanged, it is NOT
//! duplicated. The two conventions yield different roots for odd leaf
//! counts and run directories are written with promotion.
//!
//! The empty tree has root `sha256("")`.

use crate::hash::{Hash, HashError, is_hex_hash};
use serde::{Deserialize, Serialize};

/// On-disk form of a Merkle tree (`merkle-tree.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedMerkleTree {
    /// Root as hex
    pub root_hash: String,
    /// Declared number of leaves
    pub leaf_count: usize,
    /// Leaf hashes as hex, in artifact order
    pub leaves: Vec<String>,
}

/// A fully built tree. `levels[0]` holds the leaves and the last level holds
/// the single root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build the tree bottom-up.
    #[must_use]
    pub fn build(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![Vec::new(), vec![Hash::empty()]],
            };
        }

        let mut levels = vec![leaves.to_vec()];
        while levels.last().map_or(0, Vec::len) > 1 {
            let current = &levels[levels.len() - 1];
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => pair[0].chain(right),
                    None => pair[0],
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Build from hex strings, rejecting any leaf that is not 64 lowercase
    /// hex chars.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::InvalidLeaf`] for the first malformed leaf
    pub fn from_hex_leaves<S: AsRef<str>>(leaves: &[S]) -> Result<Self, MerkleError> {
        let parsed = parse_leaves(leaves)?;
        Ok(Self::build(&parsed))
    }

    /// Root hash
    #[must_use]
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first().copied())
            .unwrap_or_else(Hash::empty)
    }

    /// Leaf hashes in order
    #[must_use]
    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Number of leaves
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Every level from leaves to root
    #[must_use]
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// Tree height (number of levels above the leaves)
    #[must_use]
    pub fn height(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Convert to the on-disk form
    #[must_use]
    pub fn to_serialized(&self) -> SerializedMerkleTree {
        SerializedMerkleTree {
            root_hash: self.root().to_hex(),
            leaf_count: self.leaf_count(),
            leaves: self.leaves().iter().map(Hash::to_hex).collect(),
        }
    }
}

/// Root over `leaves` without keeping intermediate levels.
#[must_use]
pub fn compute_root(leaves: &[Hash]) -> Hash {
    MerkleTree::build(leaves).root()
}

/// Recompute the root from `tree.leaves` and compare with `tree.root_hash`.
///
/// A `leaf_count` that disagrees with the number of leaves also fails
/// verification.
///
/// # Errors
///
/// Returns [`MerkleError::InvalidLeaf`] if any leaf is malformed; such input
/// is rejected before any hashing happens
pub fn verify(tree: &SerializedMerkleTree) -> Result<bool, MerkleError> {
    let leaves = parse_leaves(&tree.leaves)?;
    if tree.leaf_count != leaves.len() {
        return Ok(false);
    }
    Ok(compute_root(&leaves).to_hex() == tree.root_hash)
}

fn parse_leaves<S: AsRef<str>>(leaves: &[S]) -> Result<Vec<Hash>, MerkleError> {
    leaves
        .iter()
        .enumerate()
        .map(|(index, leaf)| {
            let leaf = leaf.as_ref();
            if !is_hex_hash(leaf) {
                return Err(MerkleError::InvalidLeaf {
                    index,
                    value: leaf.to_string(),
                });
            }
            Hash::from_hex(leaf).map_err(MerkleError::from)
        })
        .collect()
}

/// Merkle tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    /// Leaf is not a 64-char lowercase hex hash
    #[error("invalid merkle leaf at index {index}: '{value}'")]
    InvalidLeaf {
        /// Leaf position
        index: usize,
        /// Offending text
        value: String,
    },
    /// Underlying hash parse failure
    #[error(transparent)]
    Hash(#[from] HashError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;
    use proptest::prelude::*;

    fn leaf(n: u32) -> Hash {
        Hash::compute(format!("artifact-{}", n).as_bytes())
    }

    #[test]
    fn test_empty_root() {
        let tree = MerkleTree::build(&[]);
        assert_eq!(tree.root(), Hash::empty());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let tree = MerkleTree::build(&[leaf(1)]);
        assert_eq!(tree.root(), leaf(1));
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_pair_hashes_hex_concatenation() {
        let (a, b) = (leaf(1), leaf(2));
        let expected = sha256_hex(&format!("{}{}", a.to_hex(), b.to_hex()));
        assert_eq!(compute_root(&[a, b]).to_hex(), expected);
    }

    #[test]
    fn test_odd_leaf_promoted_not_duplicated() {
        let (a, b, c) = (leaf(1), leaf(2), leaf(3));
        let tree = MerkleTree::build(&[a, b, c]);
        assert_eq!(tree.levels()[1], vec![a.chain(&b), c]);
        assert_eq!(tree.root(), a.chain(&b).chain(&c));
        // Duplicate-last convention would give a different root
        assert_ne!(tree.root(), a.chain(&b).chain(&c.chain(&c)));
    }

    #[test]
    fn test_five_leaves_promotion_across_levels() {
        let l: Vec<Hash> = (0..5).map(leaf).collect();
        let expected = l[0]
            .chain(&l[1])
            .chain(&l[2].chain(&l[3]))
            .chain(&l[4]);
        assert_eq!(compute_root(&l), expected);
    }

    #[test]
    fn test_verify_rejects_malformed_leaf() {
        let tree = SerializedMerkleTree {
            root_hash: Hash::empty().to_hex(),
            leaf_count: 1,
            leaves: vec!["ABC".to_string()],
        };
        assert_eq!(
            verify(&tree),
            Err(MerkleError::InvalidLeaf {
                index: 0,
                value: "ABC".to_string()
            })
        );
    }

    #[test]
    fn test_verify_leaf_count_mismatch() {
        let mut tree = MerkleTree::build(&[leaf(1), leaf(2)]).to_serialized();
        tree.leaf_count = 3;
        assert_eq!(verify(&tree), Ok(false));
    }

    #[test]
    fn test_verify_empty_tree() {
        let tree = MerkleTree::build(&[]).to_serialized();
        assert_eq!(verify(&tree), Ok(true));
    }

    fn flip_hex_char(s: &str, pos: usize) -> String {
        s.char_indices()
            .map(|(i, c)| {
                if i == pos {
                    if c == '0' { '1' } else { '0' }
                } else {
                    c
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_build_then_verify(seeds in proptest::collection::vec(any::<u32>(), 1..40)) {
            let leaves: Vec<Hash> = seeds.iter().copied().map(leaf).collect();
            let serialized = MerkleTree::build(&leaves).to_serialized();
            prop_assert_eq!(verify(&serialized), Ok(true));
        }

        #[test]
        fn prop_flipped_leaf_fails(
            seeds in proptest::collection::vec(any::<u32>(), 1..40),
            which in any::<prop::sample::Index>(),
            pos in 0usize..64,
        ) {
            let leaves: Vec<Hash> = seeds.iter().copied().map(leaf).collect();
            let mut serialized = MerkleTree::build(&leaves).to_serialized();
            let idx = which.index(serialized.leaves.len());
            serialized.leaves[idx] = flip_hex_char(&serialized.leaves[idx], pos);
            prop_assert_eq!(verify(&serialized), Ok(false));
        }
    }
}
