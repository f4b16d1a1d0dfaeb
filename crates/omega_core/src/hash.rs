//! SHA-256 hashes for content addressing and hash chaining.
//!
//! Hashes travel as 64-character lowercase hex strings. Parsing accepts only
//! that exact form; uppercase or padded input is rejected rather than
//! normalized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

static HEX64: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{64}$").expect("static hash pattern is valid")
});

/// Returns true if `s` is a well-formed hash string (`^[a-f0-9]{64}$`).
#[must_use]
pub fn is_hex_hash(s: &str) -> bool {
    HEX64.is_match(s)
}

/// Hash UTF-8 text and return 64 lowercase hex chars.
#[must_use]
pub fn sha256_hex(text: &str) -> String {
    Hash::compute(text.as_bytes()).to_hex()
}

/// A SHA-256 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The number of bytes in a hash
    pub const LEN: usize = 32;

    /// Compute SHA-256 of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Hash of the empty string
    #[must_use]
    pub fn empty() -> Self {
        Self::compute(b"")
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a strict lowercase hex string
    ///
    /// # Errors
    ///
    /// Returns error unless `hex` matches `^[a-f0-9]{64}$`
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != 64 {
            return Err(HashError::InvalidLength(hex.len()));
        }
        if !is_hex_hash(hex) {
            return Err(HashError::InvalidHex(hex.to_string()));
        }
        let bytes = hex::decode(hex).map_err(|_| HashError::InvalidHex(hex.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Check if hash matches data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }

    /// Combine this hash with another for a Merkle parent.
    ///
    /// Computes `sha256(hex(self) || hex(other))` over the hex text, not the
    /// raw digest bytes. Run directories written by the pipeline use this
    /// form, so it must not change.
    #[must_use]
    pub fn chain(&self, other: &Hash) -> Self {
        let mut combined = String::with_capacity(128);
        combined.push_str(&self.to_hex());
        combined.push_str(&other.to_hex());
        Self::compute(combined.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// Not lowercase hex
    #[error("invalid hash '{0}': expected lowercase hex")]
    InvalidHex(String),
    /// Wrong number of hex chars
    #[error("invalid hash length: {0} (expected 64 hex chars)")]
    InvalidLength(usize),
}
