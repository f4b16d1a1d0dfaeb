//! OMEGA Integrity Core Types
//!
//! Pure types and logic with no I/O: canonical JSON, SHA-256 hashing,
//! Merkle trees and schema versions. Everything here is deterministic for
//! identical input.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod hash;
pub mod merkle;
pub mod ser;
pub mod version;

// Re-exports
pub use canonical::{
    CanonicalValue, CanonicalizationError, MAX_SAFE_INTEGER, canonical_bytes, canonical_stringify,
    hash_object, hash_object_typed,
};
pub use hash::{Hash, HashError, is_hex_hash, sha256_hex};
pub use merkle::{MerkleError, MerkleTree, SerializedMerkleTree, compute_root, verify};
pub use ser::to_canonical_value;
pub use version::{Version, VersionError};
