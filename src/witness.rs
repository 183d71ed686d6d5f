//! Public and private circuit inputs, and the native satisfiability check.

use crate::error::{AttestationError, Result};
use crate::merkle::{MerklePath, MerkleTree};
use crate::utils::{field_to_hex, poseidon_hash};
use crate::TREE_DEPTH;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};

/// Number of public signals bound by the circuit.
pub const PUBLIC_SIGNAL_COUNT: usize = 2;

/// Public signals in binding order: `root`, then `knownBadLeafHash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    #[serde(with = "crate::utils::field_hex")]
    pub root: pallas::Base,
    #[serde(with = "crate::utils::field_hex")]
    pub known_bad_leaf_hash: pallas::Base,
}

impl PublicSignals {
    #[must_use]
    pub fn new(root: pallas::Base, known_bad_leaf_hash: pallas::Base) -> Self {
        Self {
            root,
            known_bad_leaf_hash,
        }
    }

    /// Instance column contents.
    #[must_use]
    pub fn to_vec(&self) -> Vec<pallas::Base> {
        vec![self.root, self.known_bad_leaf_hash]
    }

    /// Parses signals in binding order.
    ///
    /// # Errors
    /// `MalformedProof` unless exactly two signals are given.
    pub fn from_slice(signals: &[pallas::Base]) -> Result<Self> {
        match signals {
            [root, known_bad_leaf_hash] => Ok(Self::new(*root, *known_bad_leaf_hash)),
            _ => Err(AttestationError::MalformedProof(format!(
                "expected {PUBLIC_SIGNAL_COUNT} public signals, got {}",
                signals.len()
            ))),
        }
    }
}

/// Private inputs: the proven leaf and its path.
///
/// `path_indices` are field elements because the circuit receives them
/// unchecked; the boolean constraint is what rejects anything but 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateInputs {
    pub leaf: pallas::Base,
    pub path_elements: [pallas::Base; TREE_DEPTH],
    pub path_indices: [pallas::Base; TREE_DEPTH],
}

impl PrivateInputs {
    #[must_use]
    pub fn from_path(leaf: pallas::Base, path: &MerklePath) -> Self {
        Self {
            leaf,
            path_elements: path.path_elements,
            path_indices: path.indices_as_field(),
        }
    }
}

/// Everything the prover needs for one attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationInputs {
    pub public: PublicSignals,
    pub private: PrivateInputs,
}

impl AttestationInputs {
    /// Assembles inputs for the leaf at `index` of `tree`.
    pub fn for_leaf(
        tree: &MerkleTree,
        index: usize,
        known_bad_leaf_hash: pallas::Base,
    ) -> Result<Self> {
        let path = tree.path_for(index)?;
        let leaf = tree.leaf(index)?;
        Ok(Self {
            public: PublicSignals::new(tree.root(), known_bad_leaf_hash),
            private: PrivateInputs::from_path(leaf, &path),
        })
    }

    /// Evaluates every circuit constraint natively.
    ///
    /// A proof can be produced exactly when this succeeds.
    ///
    /// # Errors
    /// `UnsatisfiableWitness` naming the first violated constraint.
    pub fn check(&self) -> Result<()> {
        let mut node = self.private.leaf;
        for (level, (sibling, bit)) in self
            .private
            .path_elements
            .iter()
            .zip(self.private.path_indices.iter())
            .enumerate()
        {
            if *bit == pallas::Base::ZERO {
                node = poseidon_hash(node, *sibling);
            } else if *bit == pallas::Base::ONE {
                node = poseidon_hash(*sibling, node);
            } else {
                return Err(AttestationError::UnsatisfiableWitness(format!(
                    "path index at level {level} is not a bit"
                )));
            }
        }

        if node != self.public.root {
            return Err(AttestationError::UnsatisfiableWitness(format!(
                "path recomputes to {} instead of root {}",
                field_to_hex(node),
                field_to_hex(self.public.root)
            )));
        }

        if self.private.leaf == self.public.known_bad_leaf_hash {
            return Err(AttestationError::UnsatisfiableWitness(
                "leaf equals the known bad leaf".to_string(),
            ));
        }

        Ok(())
    }
}
