//! ASP-side attestation service: turns exclusion-set snapshots into proofs
//! and keeps the latest commitment servable while new ones are computed.
//!
//! Each refresh works on its own immutable snapshot and is numbered when it
//! starts. A finished refresh commits only if no newer snapshot has already
//! been committed, so a slow proof over stale leaves never replaces a proof
//! over fresher ones.

use crate::error::{AttestationError, Result};
use crate::exclusion::ExclusionSet;
use crate::identity::leaf_for_identity;
use crate::prover::{AttestationProof, ProofGenerator};
use crate::types::ProofArtifact;
use crate::utils::{field_to_hex, unix_now};
use crate::witness::AttestationInputs;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use pasta_curves::pallas;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Service settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The publicly flagged identity the proven leaf must differ from.
    pub known_bad_identity: String,
    /// Sort leaves before building the tree.
    pub sort_leaves: bool,
}

/// The latest generated attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspCommitment {
    pub root: pallas::Base,
    pub timestamp: u64,
    pub proof: AttestationProof,
    /// Snapshot number of the refresh that produced this commitment.
    pub snapshot: u64,
}

impl AspCommitment {
    #[must_use]
    pub fn to_artifact(&self) -> ProofArtifact {
        ProofArtifact::from_proof(&self.proof, self.timestamp)
    }
}

/// Result of a refresh that finished without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Committed(AspCommitment),
    /// A newer snapshot was committed first; this result was dropped.
    Superseded { snapshot: u64 },
    Cancelled { snapshot: u64 },
}

/// Handle to a background refresh.
pub struct RefreshTask {
    snapshot: u64,
    cancelled: Arc<AtomicBool>,
    current: Arc<RwLock<Option<AspCommitment>>>,
    handle: JoinHandle<Result<RefreshOutcome>>,
}

impl RefreshTask {
    #[must_use]
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    /// Asks the task to discard its result. Proof generation itself runs to
    /// completion. Once this returns, the task has either already committed
    /// or never will.
    pub fn cancel(&self) {
        let _commit = self.current.write();
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn join(self) -> Result<RefreshOutcome> {
        self.handle.join().unwrap_or_else(|_| {
            Err(AttestationError::Setup(format!(
                "refresh of snapshot {} panicked",
                self.snapshot
            )))
        })
    }
}

pub struct AttestationService<G> {
    config: ServiceConfig,
    generator: G,
    current: Arc<RwLock<Option<AspCommitment>>>,
    next_snapshot: AtomicU64,
}

impl<G: ProofGenerator + 'static> AttestationService<G> {
    pub fn new(config: ServiceConfig, generator: G) -> Self {
        Self {
            config,
            generator,
            current: Arc::new(RwLock::new(None)),
            next_snapshot: AtomicU64::new(1),
        }
    }

    /// Leaf of the configured bad identity.
    #[must_use]
    pub fn known_bad_leaf_hash(&self) -> pallas::Base {
        leaf_for_identity(&self.config.known_bad_identity)
    }

    /// Current commitment, if any refresh has succeeded.
    #[must_use]
    pub fn latest(&self) -> Option<AspCommitment> {
        self.current.read().clone()
    }

    /// Regenerates the attestation for `identities` on the calling thread.
    ///
    /// On error the previous commitment stays in place.
    pub fn refresh<S: AsRef<str>>(&self, identities: &[S]) -> Result<RefreshOutcome> {
        let snapshot = self.next_snapshot.fetch_add(1, Ordering::SeqCst);
        let set = ExclusionSet::from_identities(identities, self.config.sort_leaves)?;
        self.run_refresh(snapshot, &set, &AtomicBool::new(false))
    }

    /// Regenerates the attestation on a background thread. Readers keep
    /// seeing the previous commitment until this one commits.
    pub fn spawn_refresh(self: &Arc<Self>, identities: Vec<String>) -> RefreshTask {
        let snapshot = self.next_snapshot.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        let service = Arc::clone(self);
        let flag = Arc::clone(&cancelled);

        let handle = thread::spawn(move || {
            let set = ExclusionSet::from_identities(&identities, service.config.sort_leaves)?;
            service.run_refresh(snapshot, &set, &flag)
        });

        RefreshTask {
            snapshot,
            cancelled,
            current: Arc::clone(&self.current),
            handle,
        }
    }

    fn run_refresh(
        &self,
        snapshot: u64,
        set: &ExclusionSet,
        cancelled: &AtomicBool,
    ) -> Result<RefreshOutcome> {
        info!("Refreshing attestation for snapshot {snapshot} ({} leaves)", set.len());

        let tree = set.build_tree()?;
        let bad_leaf = self.known_bad_leaf_hash();
        let index = set.select_provable_index(bad_leaf).ok_or_else(|| {
            error!("No leaf differs from the known bad leaf in snapshot {snapshot}");
            AttestationError::UnsatisfiableWitness(
                "every exclusion-set leaf equals the known bad leaf".to_string(),
            )
        })?;
        debug!("Proving leaf {index} against root {}", field_to_hex(tree.root()));

        let inputs = AttestationInputs::for_leaf(&tree, index, bad_leaf)?;
        let proof = self.generator.generate(&inputs.public, &inputs.private)?;

        let mut current = self.current.write();
        if cancelled.load(Ordering::SeqCst) {
            info!("Refresh of snapshot {snapshot} cancelled; discarding proof");
            return Ok(RefreshOutcome::Cancelled { snapshot });
        }
        if let Some(existing) = current.as_ref() {
            if existing.snapshot > snapshot {
                warn!(
                    "Snapshot {snapshot} finished after newer snapshot {}; discarding",
                    existing.snapshot
                );
                return Ok(RefreshOutcome::Superseded { snapshot });
            }
        }

        let commitment = AspCommitment {
            root: tree.root(),
            timestamp: unix_now(),
            proof,
            snapshot,
        };
        *current = Some(commitment.clone());
        info!(
            "Committed attestation for snapshot {snapshot}, root {}",
            field_to_hex(commitment.root)
        );
        Ok(RefreshOutcome::Committed(commitment))
    }
}
