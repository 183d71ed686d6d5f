use anyhow::{Context, Result};
use asp_attestation::{
    circuit::{self, load_or_generate_params},
    config::Config,
    identity::SubmitterId,
    registry::{AttestationRegistry, RegistryLedger},
    types::ProofArtifact,
    CIRCUIT_K,
};
use clap::Parser;
use halo2_proofs::poly::commitment::Params;
use log::{debug, error, info};
use pasta_curves::vesta;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `proof.max_file_size` from the config.
const MAX_PROOF_FILE_SIZE_ENV: &str = "ASP_MAX_PROOF_FILE_SIZE";
/// Overrides `proof.max_proof_size` from the config.
const MAX_PROOF_SIZE_ENV: &str = "ASP_MAX_PROOF_SIZE";

fn env_override<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Verifies an attestation artifact and records it in the registry ledger.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    proof_file: PathBuf,

    /// Address of the ASP submitting the attestation.
    #[arg(short, long)]
    submitter: String,

    /// Admin address; required to create a ledger or register a submitter.
    #[arg(short, long)]
    admin: Option<String>,

    /// Register the submitter first (acting as `--admin`).
    #[arg(long)]
    register: bool,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry ledger file.
    #[arg(long)]
    registry: Option<PathBuf>,
}

fn open_ledger(path: &Path, admin: Option<&SubmitterId>) -> Result<RegistryLedger> {
    if path.exists() {
        debug!("Loading registry ledger from {}", path.display());
        return RegistryLedger::load(path)
            .with_context(|| format!("Failed to load registry ledger: {}", path.display()));
    }

    let admin = admin.context(
        "No registry ledger exists yet; pass --admin (or set registry.admin) to create one",
    )?;
    info!("Creating registry ledger with admin {admin}");
    Ok(RegistryLedger::new(admin.clone()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    if !args.proof_file.exists() {
        anyhow::bail!("Proof file does not exist: {}", args.proof_file.display());
    }

    info!("Loading proof from: {}", args.proof_file.display());
    let metadata = fs::metadata(&args.proof_file).context("Failed to read proof file metadata")?;
    let max_proof_file_size = env_override(MAX_PROOF_FILE_SIZE_ENV, config.proof.max_file_size);
    if metadata.len() > max_proof_file_size {
        anyhow::bail!(
            "Proof file too large: {} bytes (max {} bytes). Set {} to raise the limit",
            metadata.len(),
            max_proof_file_size,
            MAX_PROOF_FILE_SIZE_ENV
        );
    }

    let content = fs::read_to_string(&args.proof_file).context("Failed to read proof file")?;
    let artifact: ProofArtifact =
        serde_json::from_str(&content).context("Failed to parse proof JSON")?;

    artifact
        .check_timestamp(
            config.security.timestamp_tolerance_secs,
            config.security.timestamp_max_age_secs,
        )
        .context("Proof timestamp rejected")?;

    println!("Proof details:");
    println!("  Root: {}", artifact.root);
    println!("  Timestamp: {}", artifact.timestamp);
    println!("  Proof Size: {} hex chars", artifact.proof.len());

    let submitter = SubmitterId::parse(&args.submitter).context("Invalid submitter address")?;
    let admin = args
        .admin
        .as_deref()
        .or(config.registry.admin.as_deref())
        .map(SubmitterId::parse)
        .transpose()
        .context("Invalid admin address")?;

    let ledger_path = args
        .registry
        .clone()
        .unwrap_or_else(|| config.registry_state_file(&args.proof_file));
    let ledger = open_ledger(&ledger_path, admin.as_ref())?;

    let params = if config.keys.enable_persistence {
        load_or_generate_params(&config.keys.cache_dir, CIRCUIT_K)
            .context("Failed to load verification parameters")?
    } else {
        Params::<vesta::Affine>::new(CIRCUIT_K)
    };
    println!("Generating verification keys...");
    let (_prover, verifier) =
        circuit::setup(params).context("Failed to generate verification keys")?;

    let max_proof_size = env_override(MAX_PROOF_SIZE_ENV, config.proof.max_proof_size);
    let mut registry =
        AttestationRegistry::from_ledger(verifier, ledger).with_max_proof_size(max_proof_size);

    if args.register {
        let caller = admin
            .as_ref()
            .context("--register needs --admin (or registry.admin)")?;
        registry
            .register_submitter(caller, submitter.clone())
            .context("Failed to register submitter")?;
        println!("Registered submitter: {submitter}");
    }

    info!("Verifying attestation proof");
    match registry.submit_artifact(&submitter, &artifact) {
        Ok(view) => {
            let attestation = registry.latest_attestation(&submitter)?;
            println!("\n✓ Attestation accepted!");
            println!("{attestation}");
            debug!("Latest view: valid={}, timestamp={}", view.is_valid, view.timestamp);
        }
        Err(e) => {
            error!("Attestation rejected: {e}");
            println!("\n✗ Attestation rejected!");
            println!("Error: {e}");
            // Persist a registration even when the proof is refused.
            if args.register {
                registry.ledger().save(&ledger_path)?;
            }
            return Err(anyhow::anyhow!("Attestation rejected: {e}"));
        }
    }

    registry
        .ledger()
        .save(&ledger_path)
        .with_context(|| format!("Failed to save registry ledger: {}", ledger_path.display()))?;
    info!("Registry ledger saved to: {}", ledger_path.display());
    println!("\nRegistry ledger saved to: {}", ledger_path.display());

    Ok(())
}
