//! Identity normalization for exclusion-set entries and registry submitters.
//!
//! Identities are usually Ethereum addresses. Addresses are compared and
//! hashed in lowercase `0x` form so checksum casing never changes a leaf or
//! splits one submitter into two.

use crate::error::{AttestationError, Result};
use crate::utils::{identity_leaf, validate_and_strip_hex};
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ethereum addresses are 20 bytes = 40 hex characters.
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Validates an address and returns it as lowercase hex with a `0x` prefix.
///
/// ```
/// use asp_attestation::identity::normalize_address;
///
/// let normalized = normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
/// assert_eq!(normalized, "0x742d35cc6634c0532925a3b844bc454e4438f44e");
/// ```
pub fn normalize_address(address: &str) -> Result<String> {
    validate_and_strip_hex(address, ADDRESS_HEX_LENGTH)
        .map(|s| format!("0x{}", s.to_lowercase()))
        .map_err(|e| AttestationError::InvalidAddress(format!("'{address}': {e}")))
}

/// Returns true for a `0x`-prefixed, 40-digit, non-zero address.
#[must_use]
pub fn validate_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        && !address[2..].chars().all(|c| c == '0')
}

/// Canonical text of an exclusion-set identity: addresses are lowercased,
/// anything else is only trimmed.
#[must_use]
pub fn canonical_identity(identity: &str) -> String {
    let trimmed = identity.trim();
    if validate_address(&trimmed.to_lowercase()) {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Leaf for an exclusion-set identity after canonicalization.
#[must_use]
pub fn leaf_for_identity(identity: &str) -> pallas::Base {
    identity_leaf(&canonical_identity(identity))
}

/// Registry key for an ASP: a normalized address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmitterId(String);

impl SubmitterId {
    /// # Errors
    /// `InvalidAddress` if `address` is not a valid address.
    pub fn parse(address: &str) -> Result<Self> {
        normalize_address(address).map(SubmitterId)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubmitterId {
    type Error = AttestationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SubmitterId> for String {
    fn from(id: SubmitterId) -> Self {
        id.0
    }
}

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
