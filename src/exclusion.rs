//! Exclusion-set ingestion: identities in, ordered leaves out.

use crate::error::{AttestationError, Result};
use crate::identity::leaf_for_identity;
use crate::merkle::MerkleTree;
use crate::utils::field_to_bytes;
use crate::TREE_CAPACITY;
use log::{debug, info};
use pasta_curves::pallas;
use std::fs;
use std::path::Path;

/// Exclusion-set files above this size are rejected.
pub const DEFAULT_MAX_EXCLUSION_FILE_SIZE: u64 = 1024 * 1024;

/// Ordered leaves of one exclusion-set snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    leaves: Vec<pallas::Base>,
}

impl ExclusionSet {
    /// Hashes each identity into a leaf, keeping input order unless `sort`
    /// is set, in which case leaves are put in ascending numeric order.
    ///
    /// # Errors
    /// `CapacityExceeded` for more than `TREE_CAPACITY` identities.
    pub fn from_identities<S: AsRef<str>>(identities: &[S], sort: bool) -> Result<Self> {
        if identities.len() > TREE_CAPACITY {
            return Err(AttestationError::CapacityExceeded {
                len: identities.len(),
                capacity: TREE_CAPACITY,
            });
        }

        let mut leaves: Vec<pallas::Base> = identities
            .iter()
            .map(|identity| leaf_for_identity(identity.as_ref()))
            .collect();
        if sort {
            sort_ascending(&mut leaves);
        }
        debug!("Hashed {} exclusion-set identities", leaves.len());

        Ok(Self { leaves })
    }

    /// Reads a JSON array of identity strings.
    pub fn load_json(path: &Path, max_file_size: u64) -> Result<Vec<String>> {
        let metadata = fs::metadata(path)?;
        if metadata.len() > max_file_size {
            return Err(AttestationError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Exclusion-set file too large: {} bytes (max {} bytes)",
                    metadata.len(),
                    max_file_size
                ),
            )));
        }

        let content = fs::read_to_string(path)?;
        let identities: Vec<String> = serde_json::from_str(&content)?;
        info!(
            "Loaded {} identities from {}",
            identities.len(),
            path.display()
        );
        Ok(identities)
    }

    #[must_use]
    pub fn leaves(&self) -> &[pallas::Base] {
        &self.leaves
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn build_tree(&self) -> Result<MerkleTree> {
        MerkleTree::build(&self.leaves)
    }

    /// First index whose leaf differs from `known_bad_leaf_hash`, or `None`
    /// when every entry equals it.
    #[must_use]
    pub fn select_provable_index(&self, known_bad_leaf_hash: pallas::Base) -> Option<usize> {
        self.leaves
            .iter()
            .position(|leaf| *leaf != known_bad_leaf_hash)
    }
}

fn sort_ascending(leaves: &mut [pallas::Base]) {
    // The canonical encoding is little-endian; reversed it compares numerically.
    leaves.sort_by_key(|leaf| {
        let mut key = field_to_bytes(*leaf);
        key.reverse();
        key
    });
}
