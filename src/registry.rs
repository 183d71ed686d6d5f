//! Attestation registry: verifies submitted proofs and keeps exactly one
//! current attestation per registered submitter.
//!
//! Per submitter: `Unregistered -> Registered -> Attested(root)`, and every
//! accepted resubmission moves `Attested(root) -> Attested(root')` by
//! overwriting the slot. A rejected submission changes nothing.

use crate::error::{AttestationError, Result};
use crate::identity::SubmitterId;
use crate::prover::ProofVerifier;
use crate::types::{Attestation, AttestationView, ProofArtifact, DEFAULT_MAX_PROOF_SIZE};
use crate::utils::{field_to_hex, unix_now};
use crate::witness::PublicSignals;
use log::{debug, info, warn};
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Lifecycle state of one submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "attestation")]
pub enum SubmitterState {
    Unregistered,
    Registered,
    Attested(Attestation),
}

/// Serializable registry contents. Unregistered submitters are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLedger {
    pub admin: SubmitterId,
    #[serde(default)]
    pub submitters: BTreeMap<SubmitterId, SubmitterState>,
}

impl RegistryLedger {
    #[must_use]
    pub fn new(admin: SubmitterId) -> Self {
        Self {
            admin,
            submitters: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes to a sibling temp file and renames it over `path`, so readers
    /// never observe a half-written ledger.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// The verifying side of the protocol.
pub struct AttestationRegistry<V> {
    verifier: V,
    ledger: RegistryLedger,
    max_proof_size: usize,
}

impl<V: ProofVerifier> AttestationRegistry<V> {
    pub fn new(verifier: V, admin: SubmitterId) -> Self {
        Self::from_ledger(verifier, RegistryLedger::new(admin))
    }

    pub fn from_ledger(verifier: V, ledger: RegistryLedger) -> Self {
        Self {
            verifier,
            ledger,
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_proof_size(mut self, max_proof_size: usize) -> Self {
        self.max_proof_size = max_proof_size;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &RegistryLedger {
        &self.ledger
    }

    #[must_use]
    pub fn state_of(&self, id: &SubmitterId) -> SubmitterState {
        self.ledger
            .submitters
            .get(id)
            .cloned()
            .unwrap_or(SubmitterState::Unregistered)
    }

    /// Admin-only. Registering an already known submitter is a no-op and
    /// keeps any stored attestation.
    pub fn register_submitter(&mut self, caller: &SubmitterId, id: SubmitterId) -> Result<()> {
        if *caller != self.ledger.admin {
            warn!("Rejected registration of {id} by non-admin {caller}");
            return Err(AttestationError::AdminOnly(caller.to_string()));
        }

        if self.ledger.submitters.contains_key(&id) {
            debug!("Submitter {id} already registered");
            return Ok(());
        }

        info!("Registered submitter {id}");
        self.ledger.submitters.insert(id, SubmitterState::Registered);
        Ok(())
    }

    /// Submits at the current wall-clock time.
    pub fn submit_attestation(
        &mut self,
        caller: &SubmitterId,
        proof: &[u8],
        public_signals: &[pallas::Base],
    ) -> Result<AttestationView> {
        self.submit_attestation_at(caller, proof, public_signals, unix_now())
    }

    /// Verifies the proof and, only if everything checks out, replaces the
    /// caller's attestation. Any error leaves the registry unchanged.
    pub fn submit_attestation_at(
        &mut self,
        caller: &SubmitterId,
        proof: &[u8],
        public_signals: &[pallas::Base],
        timestamp: u64,
    ) -> Result<AttestationView> {
        let previous_version = match self.ledger.submitters.get(caller) {
            None => {
                warn!("Submission from unregistered caller {caller}");
                return Err(AttestationError::UnauthorizedSubmitter(caller.to_string()));
            }
            Some(SubmitterState::Unregistered) => {
                return Err(AttestationError::UnauthorizedSubmitter(caller.to_string()));
            }
            Some(SubmitterState::Registered) => 0,
            Some(SubmitterState::Attested(current)) => current.version,
        };

        if proof.len() > self.max_proof_size {
            return Err(AttestationError::MalformedProof(format!(
                "proof size {} exceeds limit of {} bytes",
                proof.len(),
                self.max_proof_size
            )));
        }
        let signals = PublicSignals::from_slice(public_signals)?;

        if let Err(e) = self.verifier.verify(proof, &signals) {
            warn!("Rejected attestation from {caller}: {e}");
            return Err(e);
        }

        let attestation = Attestation {
            root: signals.root,
            proof: proof.to_vec(),
            public_signals: signals,
            submitter: caller.to_string(),
            timestamp,
            valid: true,
            version: previous_version + 1,
        };
        let view = AttestationView::from(&attestation);
        info!(
            "Accepted attestation v{} from {caller}, root {}",
            attestation.version,
            field_to_hex(signals.root)
        );
        self.ledger
            .submitters
            .insert(caller.clone(), SubmitterState::Attested(attestation));
        Ok(view)
    }

    /// Decodes an artifact and submits it.
    pub fn submit_artifact(
        &mut self,
        caller: &SubmitterId,
        artifact: &ProofArtifact,
    ) -> Result<AttestationView> {
        let decoded = artifact.decode(self.max_proof_size)?;
        self.submit_attestation(caller, &decoded.proof, &decoded.public_signals)
    }

    /// Pure read of the current attestation.
    ///
    /// # Errors
    /// `NotFound` for submitters that are unregistered or have not attested.
    pub fn get_latest_valid_attestation(&self, id: &SubmitterId) -> Result<AttestationView> {
        self.latest_attestation(id).map(AttestationView::from)
    }

    /// Full stored record, including proof bytes.
    pub fn latest_attestation(&self, id: &SubmitterId) -> Result<&Attestation> {
        match self.ledger.submitters.get(id) {
            Some(SubmitterState::Attested(attestation)) => Ok(attestation),
            _ => Err(AttestationError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::group::ff::Field;

    /// Accepts exactly the proof bytes `[1, 2, 3]` for any signals with a
    /// non-zero root; empty proofs are malformed.
    struct FakeVerifier;

    impl ProofVerifier for FakeVerifier {
        fn verify(&self, proof: &[u8], public_signals: &PublicSignals) -> Result<()> {
            if proof.is_empty() {
                return Err(AttestationError::MalformedProof("empty".into()));
            }
            if proof == GOOD_PROOF && public_signals.root != pallas::Base::ZERO {
                Ok(())
            } else {
                Err(AttestationError::VerificationRejected("fake".into()))
            }
        }
    }

    const GOOD_PROOF: &[u8] = &[1, 2, 3];

    fn admin() -> SubmitterId {
        SubmitterId::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    fn asp() -> SubmitterId {
        SubmitterId::parse("0x00000000000000000000000000000000000000bb").unwrap()
    }

    fn signals(root: u64) -> Vec<pallas::Base> {
        vec![pallas::Base::from(root), pallas::Base::from(99)]
    }

    fn registry() -> AttestationRegistry<FakeVerifier> {
        let mut registry = AttestationRegistry::new(FakeVerifier, admin());
        registry.register_submitter(&admin(), asp()).unwrap();
        registry
    }

    #[test]
    fn test_register_requires_admin() {
        let mut registry = AttestationRegistry::new(FakeVerifier, admin());
        let err = registry.register_submitter(&asp(), asp()).unwrap_err();
        assert!(matches!(err, AttestationError::AdminOnly(_)));
        assert_eq!(registry.state_of(&asp()), SubmitterState::Unregistered);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = registry();
        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 100)
            .unwrap();
        registry.register_submitter(&admin(), asp()).unwrap();
        assert!(matches!(registry.state_of(&asp()), SubmitterState::Attested(_)));
    }

    #[test]
    fn test_unregistered_submitter_rejected() {
        let mut registry = AttestationRegistry::new(FakeVerifier, admin());
        let err = registry
            .submit_attestation(&asp(), GOOD_PROOF, &signals(5))
            .unwrap_err();
        assert!(matches!(err, AttestationError::UnauthorizedSubmitter(_)));
        assert!(registry.ledger().submitters.is_empty());
    }

    #[test]
    fn test_valid_submission_is_stored() {
        let mut registry = registry();
        let view = registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 1234)
            .unwrap();
        assert_eq!(view.root, pallas::Base::from(5));
        assert_eq!(view.timestamp, 1234);
        assert!(view.is_valid);
        assert_eq!(registry.get_latest_valid_attestation(&asp()).unwrap(), view);

        let stored = registry.latest_attestation(&asp()).unwrap();
        assert_eq!(stored.submitter, asp().to_string());
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_resubmission_supersedes() {
        let mut registry = registry();
        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 100)
            .unwrap();
        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(6), 200)
            .unwrap();

        assert_eq!(registry.ledger().submitters.len(), 1);
        let stored = registry.latest_attestation(&asp()).unwrap();
        assert_eq!(stored.root, pallas::Base::from(6));
        assert_eq!(stored.timestamp, 200);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_rejected_submission_leaves_state_untouched() {
        let mut registry = registry();
        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 100)
            .unwrap();
        let before = registry.ledger().clone();

        let rejected = registry.submit_attestation_at(&asp(), &[9, 9], &signals(7), 200);
        assert!(matches!(
            rejected,
            Err(AttestationError::VerificationRejected(_))
        ));
        let malformed = registry.submit_attestation_at(&asp(), &[], &signals(7), 200);
        assert!(matches!(malformed, Err(AttestationError::MalformedProof(_))));
        let wrong_shape =
            registry.submit_attestation_at(&asp(), GOOD_PROOF, &[pallas::Base::from(7)], 200);
        assert!(matches!(wrong_shape, Err(AttestationError::MalformedProof(_))));

        assert_eq!(registry.ledger(), &before);
    }

    #[test]
    fn test_submitters_are_independent() {
        let other = SubmitterId::parse("0x00000000000000000000000000000000000000cc").unwrap();
        let mut registry = registry();
        registry.register_submitter(&admin(), other.clone()).unwrap();

        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 100)
            .unwrap();
        let before = registry.latest_attestation(&asp()).unwrap().clone();

        registry
            .submit_attestation_at(&other, GOOD_PROOF, &signals(6), 200)
            .unwrap();
        let rejected = registry.submit_attestation_at(&other, &[9, 9], &signals(7), 300);
        assert!(matches!(
            rejected,
            Err(AttestationError::VerificationRejected(_))
        ));

        let stored = registry.latest_attestation(&asp()).unwrap();
        assert_eq!(stored, &before);
        assert_eq!(stored.root, pallas::Base::from(5));
        assert_eq!(stored.timestamp, 100);
        assert_eq!(stored.version, 1);

        let theirs = registry.latest_attestation(&other).unwrap();
        assert_eq!(theirs.root, pallas::Base::from(6));
        assert_eq!(theirs.version, 1);
        assert_eq!(registry.ledger().submitters.len(), 2);
    }

    #[test]
    fn test_first_rejected_submission_keeps_registered_state() {
        let mut registry = registry();
        assert!(registry
            .submit_attestation_at(&asp(), &[4], &signals(1), 1)
            .is_err());
        assert_eq!(registry.state_of(&asp()), SubmitterState::Registered);
        assert!(matches!(
            registry.get_latest_valid_attestation(&asp()),
            Err(AttestationError::NotFound(_))
        ));
    }

    #[test]
    fn test_oversized_proof_is_malformed() {
        let mut registry = registry().with_max_proof_size(2);
        let err = registry
            .submit_attestation(&asp(), GOOD_PROOF, &signals(5))
            .unwrap_err();
        assert!(matches!(err, AttestationError::MalformedProof(_)));
    }

    #[test]
    fn test_ledger_round_trips_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = registry();
        registry
            .submit_attestation_at(&asp(), GOOD_PROOF, &signals(5), 100)
            .unwrap();
        registry.ledger().save(&path).unwrap();

        let restored = AttestationRegistry::from_ledger(FakeVerifier, RegistryLedger::load(&path).unwrap());
        assert_eq!(restored.ledger(), registry.ledger());
        assert_eq!(
            restored.get_latest_valid_attestation(&asp()).unwrap().root,
            pallas::Base::from(5)
        );
    }
}
