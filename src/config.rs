//! Configuration file support for the ASP attestation tools.
//!
//! The prover and verifier binaries read one TOML file; every section and
//! key is optional and falls back to the defaults below.

use crate::exclusion::DEFAULT_MAX_EXCLUSION_FILE_SIZE;
use crate::types::DEFAULT_MAX_PROOF_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_PROOF_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 300;
const DEFAULT_TIMESTAMP_MAX_AGE_SECS: u64 = 86400;

/// Identity flagged as known bad when none is configured.
pub const DEFAULT_KNOWN_BAD_IDENTITY: &str = "0xBadAddress10000000000000000000000000000000";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exclusion: ExclusionConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default = "default_max_exclusion_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub default_file: Option<PathBuf>,
    #[serde(default)]
    pub sort_leaves: bool,
    #[serde(default = "default_known_bad_identity")]
    pub known_bad_identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_proof_size")]
    pub max_proof_size: usize,
    #[serde(default = "default_proof_output_file")]
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_keys_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_true")]
    pub enable_persistence: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Ledger location; defaults to the proof file with a `.registry.json` extension.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Admin address used when a new ledger is created.
    #[serde(default)]
    pub admin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_timestamp_tolerance_secs")]
    pub timestamp_tolerance_secs: u64,
    #[serde(default = "default_timestamp_max_age_secs")]
    pub timestamp_max_age_secs: u64,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_EXCLUSION_FILE_SIZE,
            default_file: None,
            sort_leaves: false,
            known_bad_identity: DEFAULT_KNOWN_BAD_IDENTITY.to_string(),
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_PROOF_FILE_SIZE,
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
            output_file: default_proof_output_file(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_keys_dir(),
            enable_persistence: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS,
            timestamp_max_age_secs: DEFAULT_TIMESTAMP_MAX_AGE_SECS,
        }
    }
}

fn default_max_exclusion_file_size() -> u64 {
    DEFAULT_MAX_EXCLUSION_FILE_SIZE
}

fn default_known_bad_identity() -> String {
    DEFAULT_KNOWN_BAD_IDENTITY.to_string()
}

fn default_max_proof_file_size() -> u64 {
    DEFAULT_MAX_PROOF_FILE_SIZE
}

fn default_max_proof_size() -> usize {
    DEFAULT_MAX_PROOF_SIZE
}

fn default_proof_output_file() -> PathBuf {
    PathBuf::from("proof.json")
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from(".keys")
}

fn default_true() -> bool {
    true
}

fn default_timestamp_tolerance_secs() -> u64 {
    DEFAULT_TIMESTAMP_TOLERANCE_SECS
}

fn default_timestamp_max_age_secs() -> u64 {
    DEFAULT_TIMESTAMP_MAX_AGE_SECS
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults. A file that is
    /// given but unreadable is an error.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Registry ledger path for a given proof file.
    #[must_use]
    pub fn registry_state_file(&self, proof_file: &Path) -> PathBuf {
        self.registry.state_file.clone().unwrap_or_else(|| {
            let mut path = proof_file.to_path_buf();
            path.set_extension("registry.json");
            path
        })
    }
}
