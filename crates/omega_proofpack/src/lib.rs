//! OMEGA Proof Pack Reader
//!
//! Read-only loading and structural validation of run directories.
//! Malformed input fails loudly with the offending file and field.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod forge;
pub mod integrity;
pub mod manifest;
pub mod reader;

#[cfg(any(test, feature = "test-support"))]
pub mod fixture;

pub use error::{ProofPackError, ProofPackResult};
pub use forge::{ForgeReport, METRIC_FIELDS};
pub use integrity::{IntegrityIssue, IntegrityReport, verify_integrity};
pub use manifest::{Manifest, ManifestArtifact};
pub use reader::{
    FORGE_REPORT_FILE, MANIFEST_FILE, MANIFEST_HASH_FILE, MERKLE_TREE_FILE, ProofPackData,
    normalize_line_endings, read_artifact, read_forge_report, read_manifest, read_manifest_bytes,
    read_manifest_hash, read_merkle_tree, read_proof_pack,
};
