use asp_attestation::{
    circuit::{self, Halo2Prover, Halo2Verifier},
    config::DEFAULT_KNOWN_BAD_IDENTITY,
    identity::{leaf_for_identity, SubmitterId},
    registry::RegistryLedger,
    AttestationError, AttestationRegistry, AttestationService, ProofArtifact, RefreshOutcome,
    ServiceConfig, SubmitterState, CIRCUIT_K,
};
use ethers::signers::{LocalWallet, Signer};
use halo2_proofs::poly::commitment::Params;
use pasta_curves::vesta;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

const ADMIN: &str = "0x00000000000000000000000000000000000000aa";
const ASP: &str = "0x00000000000000000000000000000000000000bb";

fn keys() -> &'static (Halo2Prover, Halo2Verifier) {
    static KEYS: OnceLock<(Halo2Prover, Halo2Verifier)> = OnceLock::new();
    KEYS.get_or_init(|| {
        circuit::setup(Params::<vesta::Affine>::new(CIRCUIT_K)).expect("key generation")
    })
}

fn random_addresses(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| format!("{:?}", LocalWallet::new(&mut rand::thread_rng()).address()))
        .collect()
}

fn exclusion_list(extra: usize) -> Vec<String> {
    let mut identities = vec![DEFAULT_KNOWN_BAD_IDENTITY.to_string()];
    identities.extend(random_addresses(extra));
    identities
}

fn service() -> AttestationService<Halo2Prover> {
    AttestationService::new(
        ServiceConfig {
            known_bad_identity: DEFAULT_KNOWN_BAD_IDENTITY.to_string(),
            sort_leaves: true,
        },
        keys().0.clone(),
    )
}

fn committed(outcome: RefreshOutcome) -> asp_attestation::AspCommitment {
    match outcome {
        RefreshOutcome::Committed(commitment) => commitment,
        other => panic!("expected a committed refresh, got {other:?}"),
    }
}

#[test]
fn test_service_to_registry_workflow() {
    let admin = SubmitterId::parse(ADMIN).unwrap();
    let asp = SubmitterId::parse(ASP).unwrap();
    let service = service();
    let mut registry = AttestationRegistry::new(keys().1.clone(), admin.clone());
    registry.register_submitter(&admin, asp.clone()).unwrap();

    let first = committed(service.refresh(&exclusion_list(4)).unwrap());
    let view = registry
        .submit_artifact(&asp, &first.to_artifact())
        .expect("first attestation should verify");
    assert_eq!(view.root, first.root);

    let second = committed(service.refresh(&exclusion_list(7)).unwrap());
    assert_ne!(first.root, second.root);
    registry
        .submit_artifact(&asp, &second.to_artifact())
        .expect("second attestation should verify");

    assert_eq!(registry.ledger().submitters.len(), 1);
    let latest = registry.latest_attestation(&asp).unwrap();
    assert_eq!(latest.root, second.root);
    assert_eq!(latest.version, 2);
    assert_eq!(
        latest.public_signals.known_bad_leaf_hash,
        leaf_for_identity(DEFAULT_KNOWN_BAD_IDENTITY)
    );
}

#[test]
fn test_tampered_artifact_leaves_registry_unchanged() {
    let admin = SubmitterId::parse(ADMIN).unwrap();
    let asp = SubmitterId::parse(ASP).unwrap();
    let service = service();
    let mut registry = AttestationRegistry::new(keys().1.clone(), admin.clone());
    registry.register_submitter(&admin, asp.clone()).unwrap();

    let accepted = committed(service.refresh(&exclusion_list(3)).unwrap());
    registry.submit_artifact(&asp, &accepted.to_artifact()).unwrap();
    let before = registry.ledger().clone();

    // Claim a different root with the old proof.
    let other = committed(service.refresh(&exclusion_list(5)).unwrap());
    let mut forged = accepted.to_artifact();
    forged.public_signals[0] = other.to_artifact().public_signals[0].clone();
    forged.root = forged.public_signals[0].clone();
    assert!(matches!(
        registry.submit_artifact(&asp, &forged),
        Err(AttestationError::VerificationRejected(_))
    ));

    let mut truncated = accepted.to_artifact();
    truncated.proof.truncate(truncated.proof.len() / 2);
    assert!(matches!(
        registry.submit_artifact(&asp, &truncated),
        Err(AttestationError::MalformedProof(_))
    ));

    let mut short = accepted.to_artifact();
    short.public_signals.pop();
    assert!(matches!(
        registry.submit_artifact(&asp, &short),
        Err(AttestationError::MalformedProof(_))
    ));

    assert_eq!(registry.ledger(), &before);
}

#[test]
fn test_background_refresh_with_real_prover() {
    let service = Arc::new(service());
    let task = service.spawn_refresh(exclusion_list(2));
    let commitment = committed(task.join().unwrap());
    assert_eq!(service.latest(), Some(commitment.clone()));

    let registry_admin = SubmitterId::parse(ADMIN).unwrap();
    let mut registry = AttestationRegistry::new(keys().1.clone(), registry_admin.clone());
    registry
        .register_submitter(&registry_admin, registry_admin.clone())
        .unwrap();
    assert!(registry
        .submit_artifact(&registry_admin, &commitment.to_artifact())
        .is_ok());
}

#[test]
fn test_only_bad_entries_cannot_be_attested() {
    let service = service();
    let err = service
        .refresh(&[DEFAULT_KNOWN_BAD_IDENTITY, DEFAULT_KNOWN_BAD_IDENTITY])
        .unwrap_err();
    assert!(matches!(err, AttestationError::UnsatisfiableWitness(_)));
    assert!(service.latest().is_none());
}

fn write_config(dir: &Path) -> PathBuf {
    let config = dir.join("config.toml");
    let content = format!(
        "[keys]\ncache_dir = {:?}\n\n[registry]\nadmin = \"{ADMIN}\"\n",
        dir.join("keys").display().to_string()
    );
    fs::write(&config, content).expect("Failed to write config");
    config
}

fn run(binary: &str, args: &[&OsStr]) -> Output {
    Command::new(binary)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute {binary}: {e}"))
}

#[test]
fn test_end_to_end_prover_verifier_binaries() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());
    let exclusion_file = temp_dir.path().join("exclusion.json");
    let proof_file = temp_dir.path().join("proof.json");
    let ledger_file = temp_dir.path().join("ledger.json");

    fs::write(
        &exclusion_file,
        serde_json::to_string(&exclusion_list(3)).unwrap(),
    )
    .expect("Failed to write exclusion file");

    let prover_output = run(
        env!("CARGO_BIN_EXE_prover"),
        &[
            OsStr::new("--exclusion-file"),
            exclusion_file.as_os_str(),
            OsStr::new("--output"),
            proof_file.as_os_str(),
            OsStr::new("--config"),
            config.as_os_str(),
        ],
    );
    assert!(
        prover_output.status.success(),
        "Prover failed: {}",
        String::from_utf8_lossy(&prover_output.stderr)
    );
    let artifact: ProofArtifact =
        serde_json::from_str(&fs::read_to_string(&proof_file).unwrap()).unwrap();
    assert_eq!(artifact.public_signals.len(), 2);

    let verify = |extra: &[&str]| {
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--proof-file"),
            proof_file.as_os_str(),
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("--registry"),
            ledger_file.as_os_str(),
        ];
        args.extend(extra.iter().map(|s| OsStr::new(*s)));
        run(env!("CARGO_BIN_EXE_verifier"), &args)
    };

    // Unregistered submitter is refused.
    let refused = verify(&["--submitter", ASP]);
    assert!(!refused.status.success());
    assert!(String::from_utf8_lossy(&refused.stderr).contains("Unauthorized"));

    let accepted = verify(&["--submitter", ASP, "--register"]);
    assert!(
        accepted.status.success(),
        "Verifier failed: {}",
        String::from_utf8_lossy(&accepted.stderr)
    );
    assert!(String::from_utf8_lossy(&accepted.stdout).contains("Attestation accepted"));

    let again = verify(&["--submitter", ASP]);
    assert!(again.status.success());

    let ledger = RegistryLedger::load(&ledger_file).unwrap();
    let asp = SubmitterId::parse(ASP).unwrap();
    match ledger.submitters.get(&asp) {
        Some(SubmitterState::Attested(attestation)) => assert_eq!(attestation.version, 2),
        other => panic!("expected an attestation, got {other:?}"),
    }
}

#[test]
fn test_verifier_rejects_invalid_proof_structure() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());
    let proof_file = temp_dir.path().join("invalid_proof.json");

    let invalid_json = r#"{
        "proof": "not-hex",
        "public_signals": ["00"],
        "root": "00",
        "timestamp": 1234567890
    }"#;
    fs::write(&proof_file, invalid_json).expect("Failed to write invalid proof file");

    let output = run(
        env!("CARGO_BIN_EXE_verifier"),
        &[
            OsStr::new("--proof-file"),
            proof_file.as_os_str(),
            OsStr::new("--submitter"),
            OsStr::new(ASP),
            OsStr::new("--config"),
            config.as_os_str(),
        ],
    );
    assert!(
        !output.status.success(),
        "Verifier should fail on invalid proof structure"
    );
}

#[test]
fn test_prover_rejects_oversized_exclusion_set() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());
    let exclusion_file = temp_dir.path().join("exclusion.json");
    let proof_file = temp_dir.path().join("proof.json");

    fs::write(
        &exclusion_file,
        serde_json::to_string(&exclusion_list(16)).unwrap(),
    )
    .unwrap();

    let output = run(
        env!("CARGO_BIN_EXE_prover"),
        &[
            OsStr::new("--exclusion-file"),
            exclusion_file.as_os_str(),
            OsStr::new("--output"),
            proof_file.as_os_str(),
            OsStr::new("--config"),
            config.as_os_str(),
        ],
    );
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("capacity"),
        "Error should mention capacity: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!proof_file.exists());
}
