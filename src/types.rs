//! Wire and storage types: the proof artifact exchanged between the ASP and
//! the registry, and the attestation records the registry keeps.

use crate::error::{AttestationError, Result};
use crate::prover::AttestationProof;
use crate::utils::{field_from_hex, field_to_hex, unix_now};
use crate::witness::PublicSignals;
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proof bytes above this size are rejected before verification.
pub const DEFAULT_MAX_PROOF_SIZE: usize = 512 * 1024;

/// The fixed-shape tuple crossing from the prover to the registry.
///
/// `public_signals` holds canonical hex field encodings in binding order
/// (`root`, `knownBadLeafHash`). `root` repeats the first signal for readers
/// and is never trusted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub proof: String,
    pub public_signals: Vec<String>,
    pub root: String,
    pub timestamp: u64,
}

/// Decoded artifact, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArtifact {
    pub proof: Vec<u8>,
    pub public_signals: Vec<pallas::Base>,
}

impl ProofArtifact {
    #[must_use]
    pub fn from_proof(proof: &AttestationProof, timestamp: u64) -> Self {
        Self {
            proof: hex::encode(&proof.proof),
            public_signals: proof
                .public_signals
                .to_vec()
                .into_iter()
                .map(field_to_hex)
                .collect(),
            root: field_to_hex(proof.public_signals.root),
            timestamp,
        }
    }

    /// Decodes proof bytes and signals. Signal count is left to the
    /// registry, which owns the schema check.
    ///
    /// # Errors
    /// `MalformedProof` for bad hex, non-canonical signals, oversized proofs
    /// or a `root` field that disagrees with the first signal.
    pub fn decode(&self, max_proof_size: usize) -> Result<DecodedArtifact> {
        debug!(
            "Decoding proof artifact: {} proof hex chars, {} signals",
            self.proof.len(),
            self.public_signals.len()
        );

        let proof = hex::decode(self.proof.trim_start_matches("0x"))
            .map_err(|e| AttestationError::MalformedProof(format!("Invalid proof hex: {e}")))?;
        if proof.is_empty() {
            return Err(AttestationError::MalformedProof(
                "Proof cannot be empty".to_string(),
            ));
        }
        if proof.len() > max_proof_size {
            return Err(AttestationError::MalformedProof(format!(
                "Proof size {} exceeds limit of {} bytes",
                proof.len(),
                max_proof_size
            )));
        }

        let public_signals = self
            .public_signals
            .iter()
            .map(|signal| field_from_hex(signal))
            .collect::<Result<Vec<_>>>()?;

        if let Some(first) = public_signals.first() {
            if field_from_hex(&self.root)? != *first {
                return Err(AttestationError::MalformedProof(
                    "root does not match the first public signal".to_string(),
                ));
            }
        }

        Ok(DecodedArtifact {
            proof,
            public_signals,
        })
    }

    /// Rejects artifacts timestamped in the future beyond `tolerance_secs`
    /// or older than `max_age_secs`.
    pub fn check_timestamp(&self, tolerance_secs: u64, max_age_secs: u64) -> Result<()> {
        let now = unix_now();
        if self.timestamp > now + tolerance_secs {
            return Err(AttestationError::MalformedProof(format!(
                "Timestamp is too far in the future: {} (current: {}, tolerance: {}s)",
                self.timestamp, now, tolerance_secs
            )));
        }
        if now > self.timestamp + max_age_secs {
            return Err(AttestationError::MalformedProof(format!(
                "Timestamp is too old: {} (current: {}, max age: {}s)",
                self.timestamp, now, max_age_secs
            )));
        }
        Ok(())
    }
}

/// An accepted attestation, owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(with = "crate::utils::field_hex")]
    pub root: pallas::Base,
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    pub public_signals: PublicSignals,
    pub submitter: String,
    pub timestamp: u64,
    pub valid: bool,
    /// Starts at 1 and grows by one on every supersede.
    pub version: u64,
}

/// What `getLatestValidAttestation` exposes to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationView {
    pub root: pallas::Base,
    pub timestamp: u64,
    pub is_valid: bool,
}

impl From<&Attestation> for AttestationView {
    fn from(attestation: &Attestation) -> Self {
        Self {
            root: attestation.root,
            timestamp: attestation.timestamp,
            is_valid: attestation.valid,
        }
    }
}

impl fmt::Display for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attestation:\n  Submitter: {}\n  Root: {}\n  Timestamp: {}\n  Version: {}\n  Proof: {} bytes",
            self.submitter,
            field_to_hex(self.root),
            self.timestamp,
            self.version,
            self.proof.len()
        )
    }
}
