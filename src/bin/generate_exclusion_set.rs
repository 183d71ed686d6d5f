use anyhow::{Context, Result};
use asp_attestation::{config::DEFAULT_KNOWN_BAD_IDENTITY, identity::validate_address, TREE_CAPACITY};
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// Writes a demo exclusion set of random addresses as a JSON array.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = TREE_CAPACITY)]
    count: usize,

    #[arg(short, long, default_value = "exclusion_set.json")]
    output: PathBuf,

    /// Put the default known bad identity first in the set.
    #[arg(long)]
    include_known_bad: bool,
}

fn generate_random_addresses(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let wallet = LocalWallet::new(&mut rand::thread_rng());
            format!("{:?}", wallet.address())
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.count > TREE_CAPACITY {
        anyhow::bail!(
            "Requested {} entries but the tree holds at most {}",
            args.count,
            TREE_CAPACITY
        );
    }

    let mut identities = Vec::with_capacity(args.count);
    if args.include_known_bad && args.count > 0 {
        identities.push(DEFAULT_KNOWN_BAD_IDENTITY.to_string());
    }
    identities.extend(generate_random_addresses(args.count - identities.len()));

    let generated = &identities[usize::from(args.include_known_bad && args.count > 0)..];
    if !generated.iter().all(|addr| validate_address(addr)) {
        anyhow::bail!("Generated invalid addresses");
    }
    let unique: HashSet<_> = identities.iter().collect();
    if unique.len() != identities.len() {
        anyhow::bail!("Generated duplicate addresses");
    }

    let json = serde_json::to_string_pretty(&identities)?;
    fs::write(&args.output, json)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Wrote {} identities to {}",
        identities.len(),
        args.output.display()
    );
    for (i, identity) in identities.iter().take(5).enumerate() {
        println!("  {}: {}", i, identity);
    }

    Ok(())
}
