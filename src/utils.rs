//! Field encoding, hashing and hex helpers shared by the tree, circuit and registry.

use crate::error::{AttestationError, Result};
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::{Field, PrimeField};
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};

/// Hex length of one encoded field element.
pub const FIELD_HEX_LENGTH: usize = 64;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns `MalformedProof` if the hex string has the wrong length or
/// contains non-hex characters.
///
/// # Examples
///
/// ```
/// use asp_attestation::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(AttestationError::MalformedProof(format!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(AttestationError::MalformedProof(
            "Invalid hex string: contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped.to_string())
}

const BASE_U64: u64 = 256;

/// Reduces a 32-byte big-endian digest into the Pallas base field.
///
/// Used for hashing identities into leaves, where any 256-bit digest must map
/// to some field element. It is not the inverse of [`field_to_bytes`].
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; 32]) -> pallas::Base {
    let mut value = pallas::Base::ZERO;
    let base = pallas::Base::from(BASE_U64);

    for &byte in bytes.iter() {
        value = value * base + pallas::Base::from(byte as u64);
    }

    value
}

/// Canonical little-endian encoding of a field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let repr = field.to_repr();
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

/// Decodes a canonical little-endian encoding. Returns `None` for values
/// at or above the field modulus.
#[must_use]
pub fn field_from_bytes(bytes: &[u8; 32]) -> Option<pallas::Base> {
    Option::from(pallas::Base::from_repr(*bytes))
}

/// Hex form of [`field_to_bytes`], as exchanged in public signals.
#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a public signal. Rejects wrong lengths, bad digits and
/// non-canonical encodings.
pub fn field_from_hex(input: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(input, FIELD_HEX_LENGTH)?;
    let decoded = hex::decode(&stripped)
        .map_err(|e| AttestationError::MalformedProof(format!("Invalid field hex: {e}")))?;
    let bytes: [u8; 32] = decoded
        .try_into()
        .map_err(|_| AttestationError::MalformedProof("Field element must be 32 bytes".into()))?;
    field_from_bytes(&bytes).ok_or_else(|| {
        AttestationError::MalformedProof(format!("Non-canonical field element: {stripped}"))
    })
}

/// Poseidon hash of two field elements using the `P128Pow5T3` specification.
///
/// This is the tree's two-to-one compression function. The attestation
/// circuit evaluates the same instance with `Pow5Chip`.
///
/// ```
/// use asp_attestation::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// assert_ne!(poseidon_hash(left, right), poseidon_hash(right, left));
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

/// Leaf value for one identity: SHA3-256 of the trimmed identity string,
/// reduced into the field.
#[must_use]
pub fn identity_leaf(identity: &str) -> pallas::Base {
    let digest: [u8; 32] = Sha3_256::digest(identity.trim().as_bytes()).into();
    bytes_to_field(&digest)
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Serde adapter storing a field element as canonical hex.
pub mod field_hex {
    use super::{field_from_hex, field_to_hex};
    use pasta_curves::pallas;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &pallas::Base, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_hex(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<pallas::Base, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        field_from_hex(&encoded).map_err(D::Error::custom)
    }
}
