use anyhow::{Context, Result};
use asp_attestation::{
    circuit::{self, load_or_generate_params},
    config::Config,
    exclusion::ExclusionSet,
    service::{AttestationService, RefreshOutcome, ServiceConfig},
    utils::field_to_hex,
    CIRCUIT_K,
};
use clap::Parser;
use halo2_proofs::poly::commitment::Params;
use log::{debug, info};
use pasta_curves::vesta;
use std::fs;
use std::path::PathBuf;

/// Builds the exclusion-set tree and writes an attestation proof artifact.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON array of exclusion-set identities.
    #[arg(short, long)]
    exclusion_file: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Identity whose leaf the proven leaf must differ from.
    #[arg(long)]
    known_bad: Option<String>,

    /// Sort leaves before building the tree.
    #[arg(long)]
    sort: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    let exclusion_file = args
        .exclusion_file
        .or(config.exclusion.default_file.clone())
        .context("No exclusion-set file given; pass --exclusion-file or set exclusion.default_file")?;
    let output = args.output.unwrap_or(config.proof.output_file.clone());

    println!("Loading exclusion set from: {}", exclusion_file.display());
    let identities = ExclusionSet::load_json(&exclusion_file, config.exclusion.max_file_size)
        .with_context(|| format!("Failed to load exclusion set '{}'", exclusion_file.display()))?;
    println!("Loaded {} identities", identities.len());

    let params = if config.keys.enable_persistence {
        load_or_generate_params(&config.keys.cache_dir, CIRCUIT_K)
            .context("Failed to load proving parameters")?
    } else {
        Params::<vesta::Affine>::new(CIRCUIT_K)
    };

    println!("Generating proving keys...");
    let (prover, _verifier) = circuit::setup(params).context("Failed to generate proving keys")?;

    let service = AttestationService::new(
        ServiceConfig {
            known_bad_identity: args
                .known_bad
                .unwrap_or(config.exclusion.known_bad_identity.clone()),
            sort_leaves: args.sort || config.exclusion.sort_leaves,
        },
        prover,
    );
    debug!(
        "Known bad leaf hash: {}",
        field_to_hex(service.known_bad_leaf_hash())
    );

    println!("Generating attestation proof (this may take a while)...");
    let commitment = match service.refresh(&identities).context("Failed to create proof")? {
        RefreshOutcome::Committed(commitment) => commitment,
        other => anyhow::bail!("Refresh did not commit: {other:?}"),
    };
    info!(
        "Proof generated, size: {} bytes",
        commitment.proof.proof.len()
    );

    let artifact = commitment.to_artifact();
    let json_output =
        serde_json::to_string_pretty(&artifact).context("Failed to serialize proof to JSON")?;
    fs::write(&output, json_output).context("Failed to write proof file")?;

    println!("Proof written to: {}", output.display());
    println!("Root: {}", artifact.root);
    println!("Known bad leaf hash: {}", artifact.public_signals[1]);

    Ok(())
}
