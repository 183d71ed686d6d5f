//! Fixed-depth Poseidon Merkle tree over exclusion-set leaves.
//!
//! The tree always has `2^TREE_DEPTH` slots. Slots beyond the supplied leaves
//! are filled with [`zero_leaf`], so the root depends only on the ordered leaf
//! sequence.

use crate::error::{AttestationError, Result};
use crate::utils::{identity_leaf, poseidon_hash};
use crate::{TREE_CAPACITY, TREE_DEPTH};
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;

/// Identity whose hash fills unused slots.
pub const PADDING_IDENTITY: &str = "__DEFAULT_PADDING_LEAF__";

/// Canonical padding leaf.
#[must_use]
pub fn zero_leaf() -> pallas::Base {
    identity_leaf(PADDING_IDENTITY)
}

/// Inclusion path for one leaf.
///
/// `path_indices[k]` is 0 when the running node is the left child at level
/// `k` and 1 when it is the right child; it is bit `k` of the leaf index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerklePath {
    pub leaf_index: usize,
    pub path_elements: [pallas::Base; TREE_DEPTH],
    pub path_indices: [u8; TREE_DEPTH],
}

impl MerklePath {
    /// Replays the path from `leaf` with the same combination rule the circuit uses.
    #[must_use]
    pub fn compute_root(&self, leaf: pallas::Base) -> pallas::Base {
        self.path_elements
            .iter()
            .zip(self.path_indices.iter())
            .fold(leaf, |node, (sibling, bit)| {
                if *bit == 0 {
                    poseidon_hash(node, *sibling)
                } else {
                    poseidon_hash(*sibling, node)
                }
            })
    }

    /// Direction bits as field elements, in circuit order.
    #[must_use]
    pub fn indices_as_field(&self) -> [pallas::Base; TREE_DEPTH] {
        self.path_indices.map(|bit| pallas::Base::from(bit as u64))
    }
}

/// Binary Merkle tree of fixed depth.
///
/// Stores every level so paths are read off without rehashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// Number of leaves supplied by the caller; the rest are padding.
    leaf_count: usize,
    /// `levels[0]` holds the padded leaves, `levels[TREE_DEPTH]` the root.
    levels: Vec<Vec<pallas::Base>>,
}

impl MerkleTree {
    /// Builds the tree over `leaves`, padding on the right.
    ///
    /// # Errors
    /// `CapacityExceeded` if more than `TREE_CAPACITY` leaves are supplied.
    pub fn build(leaves: &[pallas::Base]) -> Result<Self> {
        if leaves.len() > TREE_CAPACITY {
            return Err(AttestationError::CapacityExceeded {
                len: leaves.len(),
                capacity: TREE_CAPACITY,
            });
        }

        let mut level = leaves.to_vec();
        level.resize(TREE_CAPACITY, zero_leaf());

        let mut levels = Vec::with_capacity(TREE_DEPTH + 1);
        levels.push(level);
        for depth in 0..TREE_DEPTH {
            let next = levels[depth]
                .chunks_exact(2)
                .map(|pair| poseidon_hash(pair[0], pair[1]))
                .collect();
            levels.push(next);
        }

        Ok(MerkleTree {
            leaf_count: leaves.len(),
            levels,
        })
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.levels[TREE_DEPTH][0]
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Supplied leaves, without padding.
    #[must_use]
    pub fn leaves(&self) -> &[pallas::Base] {
        &self.levels[0][..self.leaf_count]
    }

    pub fn leaf(&self, index: usize) -> Result<pallas::Base> {
        self.check_index(index)?;
        Ok(self.levels[0][index])
    }

    /// Inclusion path for the leaf at `index`.
    ///
    /// # Errors
    /// `InvalidIndex` if `index` is not one of the supplied leaves.
    pub fn path_for(&self, index: usize) -> Result<MerklePath> {
        self.check_index(index)?;

        let mut path_elements = [pallas::Base::ZERO; TREE_DEPTH];
        let mut path_indices = [0u8; TREE_DEPTH];
        let mut position = index;
        for depth in 0..TREE_DEPTH {
            path_indices[depth] = (position & 1) as u8;
            path_elements[depth] = self.levels[depth][position ^ 1];
            position >>= 1;
        }

        Ok(MerklePath {
            leaf_index: index,
            path_elements,
            path_indices,
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.leaf_count {
            return Err(AttestationError::InvalidIndex {
                index,
                len: self.leaf_count,
            });
        }
        Ok(())
    }
}
