//! ASP Exclusion-Set Attestation
//!
//! An Association Set Provider (ASP) publishes the Merkle root of its
//! exclusion set and proves in zero knowledge that the set contains a leaf
//! other than a publicly known bad leaf. A registry accepts a new root from a
//! registered ASP only when that proof verifies.
//!
//! # Components
//!
//! - [`MerkleTree`]: fixed-depth Poseidon tree over exclusion-set leaves
//! - [`AttestationCircuit`]: Halo2 circuit binding `root` and `knownBadLeafHash`
//! - [`Halo2Prover`] / [`Halo2Verifier`]: proof backend behind [`ProofGenerator`]
//!   and [`ProofVerifier`]
//! - [`AttestationRegistry`]: submitter registration and verified attestations
//! - [`AttestationService`]: ASP-side refresh of the published proof
//!
//! # Limitation
//!
//! A proof shows that one leaf differs from one known bad leaf. It does not
//! show that the bad leaf is absent from the set: an ASP whose tree contains
//! the bad leaf can still prove using any other leaf.
//!
//! # Example
//!
//! ```no_run
//! use asp_attestation::{circuit, exclusion::ExclusionSet, identity::leaf_for_identity};
//! use asp_attestation::{AttestationInputs, ProofVerifier, CIRCUIT_K};
//! use halo2_proofs::poly::commitment::Params;
//! use pasta_curves::vesta;
//!
//! let set = ExclusionSet::from_identities(&["0xaa", "0xbb"], false).unwrap();
//! let tree = set.build_tree().unwrap();
//! let bad = leaf_for_identity("0xbb");
//!
//! let (prover, verifier) = circuit::setup(Params::<vesta::Affine>::new(CIRCUIT_K)).unwrap();
//! let inputs = AttestationInputs::for_leaf(&tree, 0, bad).unwrap();
//! let proof = prover.prove(&inputs).unwrap();
//! verifier.verify(&proof, &inputs.public).unwrap();
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod identity;
pub mod merkle;
pub mod prover;
pub mod registry;
pub mod service;
pub mod types;
pub mod utils;
pub mod witness;


pub use circuit::{AttestationCircuit, Halo2Prover, Halo2Verifier};
pub use error::{AttestationError, Result};
pub use merkle::{MerklePath, MerkleTree};
pub use prover::{AttestationProof, ProofGenerator, ProofVerifier};
pub use registry::{AttestationRegistry, RegistryLedger, SubmitterState};
pub use service::{AspCommitment, AttestationService, RefreshOutcome, ServiceConfig};
pub use types::{Attestation, AttestationView, ProofArtifact};
pub use utils::{bytes_to_field, field_to_bytes, poseidon_hash};
pub use witness::{AttestationInputs, PrivateInputs, PublicSignals};

/// Depth of the exclusion-set tree.
///
/// The circuit is synthesized for exactly this many path levels, so every
/// proof carries four siblings regardless of how many leaves are real.
pub const TREE_DEPTH: usize = 4;

/// Maximum number of exclusion-set entries (`2^TREE_DEPTH`).
pub const TREE_CAPACITY: usize = 1 << TREE_DEPTH;

/// Circuit parameter for the Halo2 proving system.
///
/// `k=10` gives 1024 rows. Each Poseidon permutation with the Pow5 chip takes
/// a few dozen rows, and the circuit runs `TREE_DEPTH` of them plus one path
/// row per level and a single inequality row.
///
/// # Security Considerations
///
/// Changing `CIRCUIT_K` or `TREE_DEPTH` requires regenerating the params
/// cache and all keys. Prover and verifier must agree on both, or every
/// verification fails.
pub const CIRCUIT_K: u32 = 10;
