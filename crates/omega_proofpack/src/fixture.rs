//! Run directory builder for tests.
//!
//! Writes a self-consistent proof pack by default (sidecar hash, merkle
//! root and `merkle-tree.json` all agree with the artifacts). Individual
//! links can be broken on purpose to exercise failure paths.

use crate::reader::{FORGE_REPORT_FILE, MANIFEST_FILE, MANIFEST_HASH_FILE, MERKLE_TREE_FILE};
use omega_core::{Hash, MerkleTree};
use serde_json::{Map, Value, json};
use std::io;
use std::path::{Path, PathBuf};

/// Builder for an on-disk run directory
#[derive(Debug, Clone)]
pub struct RunDirBuilder {
    run_id: String,
    seed: String,
    verdict: String,
    stages: Vec<String>,
    artifacts: Vec<(String, Vec<u8>)>,
    forge_report: Option<Value>,
    merkle_root: Option<Hash>,
    sidecar: Option<String>,
    overrides: Map<String, Value>,
    crlf: bool,
}

impl RunDirBuilder {
    /// Start a run with seed `"42"`, verdict `"PASS"` and two stages
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            seed: "42".to_string(),
            verdict: "PASS".to_string(),
            stages: vec!["10-plan".to_string(), "20-draft".to_string()],
            artifacts: Vec::new(),
            forge_report: None,
            merkle_root: None,
            sidecar: None,
            overrides: Map::new(),
            crlf: false,
        }
    }

    /// Add an artifact; its hash is computed from `content`
    #[must_use]
    pub fn artifact(mut self, path: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        self.artifacts.push((path.into(), content.as_ref().to_vec()));
        self
    }

    /// Set the seed
    #[must_use]
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    /// Set the verdict
    #[must_use]
    pub fn verdict(mut self, verdict: impl Into<String>) -> Self {
        self.verdict = verdict.into();
        self
    }

    /// Replace the completed stages
    #[must_use]
    pub fn stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Write `50-forge/forge-report.json`
    #[must_use]
    pub fn forge_report(mut self, report: Value) -> Self {
        self.forge_report = Some(report);
        self
    }

    /// Store this root in the manifest instead of the computed one
    #[must_use]
    pub fn merkle_root(mut self, root: Hash) -> Self {
        self.merkle_root = Some(root);
        self
    }

    /// Write this text to `manifest.sha256` instead of the real digest
    #[must_use]
    pub fn sidecar(mut self, text: impl Into<String>) -> Self {
        self.sidecar = Some(text.into());
        self
    }

    /// Overwrite a top-level manifest field after generation
    #[must_use]
    pub fn manifest_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    /// Write `manifest.json` with CRLF line endings
    #[must_use]
    pub fn crlf(mut self, crlf: bool) -> Self {
        self.crlf = crlf;
        self
    }

    /// Artifact hashes in insertion order
    #[must_use]
    pub fn artifact_hashes(&self) -> Vec<Hash> {
        self.artifacts
            .iter()
            .map(|(_, content)| Hash::compute(content))
            .collect()
    }

    /// Write the run directory at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns any filesystem error
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        for (path, content) in &self.artifacts {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }

        let leaves = self.artifact_hashes();
        let tree = MerkleTree::build(&leaves);
        let root = self.merkle_root.unwrap_or_else(|| tree.root());

        let artifacts: Vec<Value> = self
            .artifacts
            .iter()
            .zip(&leaves)
            .map(|((path, _), hash)| json!({"path": path, "sha256": hash.to_hex()}))
            .collect();

        let mut manifest = json!({
            "run_id": self.run_id,
            "merkle_root": root.to_hex(),
            "artifacts": artifacts,
            "stages_completed": self.stages,
            "seed": self.seed,
            "verdict": self.verdict,
        });
        if let Some(obj) = manifest.as_object_mut() {
            for (key, value) in &self.overrides {
                obj.insert(key.clone(), value.clone());
            }
        }

        let mut text = serde_json::to_string_pretty(&manifest)?;
        text.push('\n');
        if self.crlf {
            text = text.replace('\n', "\r\n");
        }
        std::fs::write(dir.join(MANIFEST_FILE), &text)?;

        let sidecar = match &self.sidecar {
            Some(custom) => custom.clone(),
            None => format!("{}  {}\n", Hash::compute(text.as_bytes()), MANIFEST_FILE),
        };
        std::fs::write(dir.join(MANIFEST_HASH_FILE), sidecar)?;

        std::fs::write(
            dir.join(MERKLE_TREE_FILE),
            serde_json::to_vec_pretty(&tree.to_serialized())?,
        )?;

        if let Some(report) = &self.forge_report {
            let target = dir.join(FORGE_REPORT_FILE);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, serde_json::to_vec_pretty(report)?)?;
        }

        Ok(dir.to_path_buf())
    }
}
