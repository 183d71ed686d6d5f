//! Error taxonomy for tree queries, proof generation and registry submissions.

use thiserror::Error;

/// Errors produced by the attestation core.
///
/// Tree and witness errors are local to the caller. Registry errors abort
/// the whole submission and leave the registry untouched.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// Tree query for a slot that holds no exclusion-set entry.
    #[error("Invalid leaf index {index}: the tree holds {len} leaves")]
    InvalidIndex { index: usize, len: usize },

    /// More exclusion-set entries than the fixed-depth tree can hold.
    #[error("Exclusion set has {len} entries but the tree capacity is {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Private inputs do not satisfy the attestation constraints.
    #[error("Unsatisfiable witness: {0}")]
    UnsatisfiableWitness(String),

    /// Proof does not verify against the verifying key and public signals.
    #[error("Verification rejected: {0}")]
    VerificationRejected(String),

    /// Text that is not a 20-byte hex address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Caller is neither registered nor attested.
    #[error("Unauthorized submitter: {0}")]
    UnauthorizedSubmitter(String),

    /// Registration attempted by someone other than the registry admin.
    #[error("Only the registry admin may register submitters (caller {0})")]
    AdminOnly(String),

    /// Proof or public signals have the wrong shape or encoding.
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// No attestation stored for the submitter.
    #[error("No attestation found for {0}")]
    NotFound(String),

    /// Key generation or proof construction failed inside the proving system.
    #[error("Proving system error: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<halo2_proofs::plonk::Error> for AttestationError {
    fn from(err: halo2_proofs::plonk::Error) -> Self {
        AttestationError::Setup(format!("{err:?}"))
    }
}

pub type Result<T> = std::result::Result<T, AttestationError>;
