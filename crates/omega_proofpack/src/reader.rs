//! Read-only loading of a run directory.
//!
//! Every function here opens files for reading only. Nothing is written,
//! created or touched, so reading a run leaves its file metadata unchanged.

use crate::error::{ProofPackError, ProofPackResult};
use crate::forge::ForgeReport;
use crate::manifest::{Fields, Manifest, parse_hash};
use omega_core::{Hash, SerializedMerkleTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";
/// Sidecar digest of the manifest bytes
pub const MANIFEST_HASH_FILE: &str = "manifest.sha256";
/// Serialized Merkle tree
pub const MERKLE_TREE_FILE: &str = "merkle-tree.json";
/// Optional quality report, relative to the run directory
pub const FORGE_REPORT_FILE: &str = "50-forge/forge-report.json";

/// Everything known about one run, loaded in a single pass.
///
/// Immutable once built; reading the same directory again yields an equal
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofPackData {
    /// Run directory the data was read from
    pub run_dir: PathBuf,
    /// `manifest.run_id`
    pub run_id: String,
    /// Parsed manifest
    pub manifest: Manifest,
    /// Digest recorded in `manifest.sha256`
    pub manifest_hash: Hash,
    /// SHA-256 of `manifest.json` bytes as read
    pub manifest_digest: Hash,
    /// SHA-256 of `manifest.json` bytes with CRLF folded to LF
    pub manifest_lf_digest: Hash,
    /// Parsed `merkle-tree.json`
    pub merkle_tree: SerializedMerkleTree,
    /// Quality report, if the run reached the forge stage
    pub forge_report: Option<ForgeReport>,
}

impl ProofPackData {
    /// True if a quality report was present
    #[must_use]
    pub fn has_forge_report(&self) -> bool {
        self.forge_report.is_some()
    }
}

fn read_bytes(path: &Path) -> ProofPackResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| ProofPackError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json(bytes: &[u8], path: &Path) -> ProofPackResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| ProofPackError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Raw `manifest.json` bytes
///
/// # Errors
///
/// Returns [`ProofPackError::Io`] if the file cannot be read
pub fn read_manifest_bytes(run_dir: &Path) -> ProofPackResult<Vec<u8>> {
    read_bytes(&run_dir.join(MANIFEST_FILE))
}

/// Read and validate `manifest.json`
///
/// # Errors
///
/// I/O, JSON, validation or hash format errors, each naming the file
pub fn read_manifest(run_dir: &Path) -> ProofPackResult<Manifest> {
    let path = run_dir.join(MANIFEST_FILE);
    let bytes = read_bytes(&path)?;
    let value = parse_json(&bytes, &path)?;
    let manifest = Manifest::from_value(&value, &path)?;
    debug!(
        path = %path.display(),
        run_id = %manifest.run_id,
        artifacts = manifest.artifacts.len(),
        "read manifest"
    );
    Ok(manifest)
}

/// Read `manifest.sha256`.
///
/// Accepts a bare digest or `sha256sum` output (`<hex>  manifest.json`);
/// only the first whitespace-separated token is used.
///
/// # Errors
///
/// [`ProofPackError::Format`] if the token is not 64 lowercase hex chars
pub fn read_manifest_hash(run_dir: &Path) -> ProofPackResult<Hash> {
    let path = run_dir.join(MANIFEST_HASH_FILE);
    let bytes = read_bytes(&path)?;
    let text = String::from_utf8_lossy(&bytes);
    let token = text.split_whitespace().next().unwrap_or("");
    parse_hash(token, &path, MANIFEST_HASH_FILE)
}

/// Read and validate `merkle-tree.json`.
///
/// Only the shape is checked here; whether the root matches the leaves is
/// left to [`crate::verify_integrity`].
///
/// # Errors
///
/// I/O, JSON, validation or hash format errors, each naming the file
pub fn read_merkle_tree(run_dir: &Path) -> ProofPackResult<SerializedMerkleTree> {
    let path = run_dir.join(MERKLE_TREE_FILE);
    let bytes = read_bytes(&path)?;
    let value = parse_json(&bytes, &path)?;
    let fields = Fields::root(&value, &path, "merkle-tree")?;

    let root_hash = fields.hash("root_hash")?.to_hex();
    let leaf_count = fields.count("leaf_count")?;
    let leaves = fields
        .array("leaves")?
        .iter()
        .enumerate()
        .map(|(i, leaf)| {
            let field = format!("leaves[{}]", i);
            let raw = leaf.as_str().ok_or_else(|| {
                ProofPackError::validation(&path, field.clone(), "must be a string")
            })?;
            parse_hash(raw, &path, &field).map(|h| h.to_hex())
        })
        .collect::<ProofPackResult<Vec<_>>>()?;

    debug!(path = %path.display(), leaf_count, "read merkle tree");
    Ok(SerializedMerkleTree {
        root_hash,
        leaf_count,
        leaves,
    })
}

/// Read `50-forge/forge-report.json` if the run has one.
///
/// A missing file is the normal case for runs that stopped before the forge
/// stage and yields `Ok(None)`. Any other read failure is an error.
///
/// # Errors
///
/// I/O errors other than not-found, invalid JSON, or a non-object document
pub fn read_forge_report(run_dir: &Path) -> ProofPackResult<Option<ForgeReport>> {
    let path = run_dir.join(FORGE_REPORT_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no forge report");
            return Ok(None);
        }
        Err(source) => return Err(ProofPackError::Io { path, source }),
    };
    let value = parse_json(&bytes, &path)?;
    if !value.is_object() {
        return Err(ProofPackError::validation(
            &path,
            "forge-report",
            "must be a JSON object",
        ));
    }
    debug!(path = %path.display(), "read forge report");
    Ok(Some(ForgeReport::new(value)))
}

/// Replace every CRLF with LF
#[must_use]
pub fn normalize_line_endings(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Load a whole run directory.
///
/// The manifest must agree with its sidecar digest, and its `merkle_root`
/// must be the root of `artifacts[].sha256` in listed order. A run that
/// fails either check is not loaded. The standalone `merkle-tree.json` is
/// only shape-checked; see [`crate::verify_integrity`].
///
/// # Errors
///
/// The first error from any of the component reads, or
/// [`ProofPackError::Validation`] naming `manifest.sha256` or
/// `merkle_root` when a digest does not match
pub fn read_proof_pack(run_dir: &Path) -> ProofPackResult<ProofPackData> {
    let manifest_path = run_dir.join(MANIFEST_FILE);
    let manifest_bytes = read_bytes(&manifest_path)?;
    let manifest_digest = Hash::compute(&manifest_bytes);
    let manifest_lf_digest = Hash::compute(&normalize_line_endings(&manifest_bytes));
    let value = parse_json(&manifest_bytes, &manifest_path)?;
    let manifest = Manifest::from_value(&value, &manifest_path)?;

    let manifest_hash = read_manifest_hash(run_dir)?;
    if manifest_hash != manifest_digest {
        return Err(ProofPackError::validation(
            run_dir.join(MANIFEST_HASH_FILE),
            MANIFEST_HASH_FILE,
            format!(
                "records {} but {} hashes to {}",
                manifest_hash, MANIFEST_FILE, manifest_digest
            ),
        ));
    }

    let computed_root = manifest.computed_merkle_root();
    if computed_root != manifest.merkle_root {
        return Err(ProofPackError::validation(
            &manifest_path,
            "merkle_root",
            format!(
                "is {} but artifacts[].sha256 build {}",
                manifest.merkle_root, computed_root
            ),
        ));
    }

    let merkle_tree = read_merkle_tree(run_dir)?;
    let forge_report = read_forge_report(run_dir)?;

    debug!(
        run_dir = %run_dir.display(),
        run_id = %manifest.run_id,
        artifacts = manifest.artifacts.len(),
        forge_report = forge_report.is_some(),
        "loaded proof pack"
    );

    Ok(ProofPackData {
        run_dir: run_dir.to_path_buf(),
        run_id: manifest.run_id.clone(),
        manifest,
        manifest_hash,
        manifest_digest,
        manifest_lf_digest,
        merkle_tree,
        forge_report,
    })
}

/// Raw bytes of one artifact.
///
/// `artifact` must be relative and stay inside `run_dir`.
///
/// # Errors
///
/// [`ProofPackError::UnsafeArtifactPath`] for absolute or `..` paths,
/// [`ProofPackError::Io`] if the file cannot be read
pub fn read_artifact(run_dir: &Path, artifact: &str) -> ProofPackResult<Vec<u8>> {
    let relative = Path::new(artifact);
    let safe = !artifact.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(ProofPackError::UnsafeArtifactPath {
            run_dir: run_dir.to_path_buf(),
            artifact: artifact.to_string(),
        });
    }
    read_bytes(&run_dir.join(relative))
}
