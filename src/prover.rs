//! Proof generation and verification capabilities.
//!
//! The registry and the ASP service depend on these traits only. The Halo2
//! backends live in [`crate::circuit`]; tests may substitute an in-process
//! fake that never touches key material.

use crate::error::Result;
use crate::witness::{PrivateInputs, PublicSignals};
use serde::{Deserialize, Serialize};

/// A succinct proof together with the public signals it was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationProof {
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    pub public_signals: PublicSignals,
}

/// Produces attestation proofs with a fixed proving key.
pub trait ProofGenerator: Send + Sync {
    /// Generates a proof that `private` satisfies the attestation circuit
    /// for `public`.
    ///
    /// # Errors
    /// `UnsatisfiableWitness` when the leaf is not on the path to the root,
    /// a direction is not a bit, or the leaf equals the known bad leaf.
    fn generate(&self, public: &PublicSignals, private: &PrivateInputs) -> Result<AttestationProof>;
}

/// Checks proofs against a fixed verifying key.
pub trait ProofVerifier: Send + Sync {
    /// # Errors
    /// `MalformedProof` for undecodable proof bytes, `VerificationRejected`
    /// for well-formed proofs that do not verify.
    fn verify(&self, proof: &[u8], public_signals: &PublicSignals) -> Result<()>;
}

impl<T: ProofGenerator + ?Sized> ProofGenerator for std::sync::Arc<T> {
    fn generate(&self, public: &PublicSignals, private: &PrivateInputs) -> Result<AttestationProof> {
        (**self).generate(public, private)
    }
}

impl<T: ProofVerifier + ?Sized> ProofVerifier for std::sync::Arc<T> {
    fn verify(&self, proof: &[u8], public_signals: &PublicSignals) -> Result<()> {
        (**self).verify(proof, public_signals)
    }
}
