//! # Account Addresses
//!
//! A 20-byte account identifier shared by depositors, strategies,
//! accountants and vaults alike. The all-zero address plays the role of
//! "nobody": unset modules, cleared governance slots and burned balances.
//!
//! Addresses are derived deterministically with BLAKE3 so test fixtures and
//! factory deployments can name accounts without a key pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Domain separator for label-derived addresses.
const LABEL_DOMAIN: &[u8] = b"strata.address.label.v1";

/// Domain separator for addresses derived from structured inputs.
const DERIVE_DOMAIN: &[u8] = b"strata.address.derive.v1";

/// Errors from parsing a textual address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The string is not valid hex.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    /// The decoded byte length is not 20.
    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The empty address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derives a stable address from a human-readable label.
    ///
    /// Handy for fixtures: `Address::from_label("alice")` is the same account
    /// in every test run.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(LABEL_DOMAIN);
        hasher.update(label.as_bytes());
        Self::truncate(hasher.finalize())
    }

    /// Derives an address from an ordered list of byte parts. Each part is
    /// length-prefixed so `["ab", "c"]` and `["a", "bc"]` never collide.
    pub fn derive(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DERIVE_DOMAIN);
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self::truncate(hasher.finalize())
    }

    fn truncate(hash: blake3::Hash) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the empty address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps test failure output readable.
        let full = hex::encode(self.0);
        write!(f, "Address(0x{}..{})", &full[..6], &full[34..])
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(trimmed).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
