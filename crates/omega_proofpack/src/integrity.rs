//! Cross-checks between the files of one run.
//!
//! A run directory carries its digests three times over: the sidecar
//! digest of `manifest.json`, the `merkle_root` inside the manifest and the
//! standalone `merkle-tree.json`. [`crate::read_proof_pack`] already refuses
//! runs whose sidecar or `merkle_root` is wrong; this check also covers
//! `merkle-tree.json` and data assembled in memory. Every broken link is
//! reported; nothing here returns an error.

use crate::reader::ProofPackData;
use omega_core::merkle;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One broken link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// `manifest.sha256` disagrees with the manifest bytes
    SidecarMismatch {
        /// Digest recorded in the sidecar
        recorded: String,
        /// Digest of the bytes on disk
        actual: String,
    },
    /// `merkle-tree.json` root does not follow from its own leaves
    TreeInconsistent {
        /// Why verification failed
        reason: String,
    },
    /// `manifest.merkle_root` does not follow from `artifacts[].sha256`
    ManifestRootMismatch {
        /// Root in the manifest
        recorded: String,
        /// Root rebuilt from the artifact list
        computed: String,
    },
    /// `manifest.merkle_root` differs from `merkle-tree.json`'s root
    TreeRootMismatch {
        /// Root in the manifest
        manifest: String,
        /// Root in `merkle-tree.json`
        tree: String,
    },
}

/// Outcome of [`verify_integrity`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Run checked
    pub run_id: String,
    /// Broken links, empty when the run is consistent
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// True when every link holds
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every integrity link of a loaded run
#[must_use]
pub fn verify_integrity(pack: &ProofPackData) -> IntegrityReport {
    let mut issues = Vec::new();

    if pack.manifest_hash != pack.manifest_digest {
        issues.push(IntegrityIssue::SidecarMismatch {
            recorded: pack.manifest_hash.to_hex(),
            actual: pack.manifest_digest.to_hex(),
        });
    }

    match merkle::verify(&pack.merkle_tree) {
        Ok(true) => {}
        Ok(false) => issues.push(IntegrityIssue::TreeInconsistent {
            reason: "root_hash does not match leaves".to_string(),
        }),
        Err(e) => issues.push(IntegrityIssue::TreeInconsistent {
            reason: e.to_string(),
        }),
    }

    let computed = pack.manifest.computed_merkle_root();
    if computed != pack.manifest.merkle_root {
        issues.push(IntegrityIssue::ManifestRootMismatch {
            recorded: pack.manifest.merkle_root.to_hex(),
            computed: computed.to_hex(),
        });
    }

    if pack.manifest.merkle_root.to_hex() != pack.merkle_tree.root_hash {
        issues.push(IntegrityIssue::TreeRootMismatch {
            manifest: pack.manifest.merkle_root.to_hex(),
            tree: pack.merkle_tree.root_hash.clone(),
        });
    }

    if !issues.is_empty() {
        warn!(
            run_id = %pack.run_id,
            issues = issues.len(),
            "proof pack integrity check failed"
        );
    }

    IntegrityReport {
        run_id: pack.run_id.clone(),
        issues,
    }
}
