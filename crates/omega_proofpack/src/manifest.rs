//! Run manifest model and structural validation.

use crate::error::{ProofPackError, ProofPackResult};
use omega_core::{Hash, compute_root, is_hex_hash};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One output file of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestArtifact {
    /// POSIX path relative to the run directory
    pub path: String,
    /// SHA-256 of the artifact bytes
    pub sha256: Hash,
}

/// `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Run identifier
    pub run_id: String,
    /// Merkle root over `artifacts[].sha256` in listed order
    pub merkle_root: Hash,
    /// Output files
    pub artifacts: Vec<ManifestArtifact>,
    /// Pipeline stages that finished
    pub stages_completed: Vec<String>,
    /// Generation seed
    pub seed: String,
    /// Pipeline verdict
    pub verdict: String,
}

impl Manifest {
    /// Validate a parsed JSON document field by field.
    ///
    /// Unknown fields are ignored. `source` is only used for error messages.
    ///
    /// # Errors
    ///
    /// [`ProofPackError::Validation`] for missing or mistyped fields,
    /// [`ProofPackError::Format`] for malformed hashes
    pub fn from_value(value: &Value, source: &Path) -> ProofPackResult<Self> {
        let fields = Fields::root(value, source, "manifest")?;

        let run_id = fields.non_empty_str("run_id")?;
        let merkle_root = fields.hash("merkle_root")?;
        let seed = fields.string("seed")?;
        let verdict = fields.string("verdict")?;

        let stages_completed = fields
            .array("stages_completed")?
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                stage.as_str().map(str::to_string).ok_or_else(|| {
                    ProofPackError::validation(
                        source,
                        format!("stages_completed[{}]", i),
                        "must be a string",
                    )
                })
            })
            .collect::<ProofPackResult<Vec<_>>>()?;

        let mut seen = BTreeSet::new();
        let mut artifacts = Vec::new();
        for (i, entry) in fields.array("artifacts")?.iter().enumerate() {
            let label = format!("artifacts[{}]", i);
            let entry_fields = Fields::nested(entry, source, &label)?;
            let path = entry_fields.non_empty_str("path")?;
            if path.starts_with('/') || path.contains('\\') {
                return Err(ProofPackError::validation(
                    source,
                    format!("{}.path", label),
                    format!("must be a relative POSIX path, got '{}'", path),
                ));
            }
            if !seen.insert(path.clone()) {
                return Err(ProofPackError::validation(
                    source,
                    format!("{}.path", label),
                    format!("duplicates an earlier artifact '{}'", path),
                ));
            }
            let sha256 = entry_fields.hash("sha256")?;
            artifacts.push(ManifestArtifact { path, sha256 });
        }

        Ok(Self {
            run_id,
            merkle_root,
            artifacts,
            stages_completed,
            seed,
            verdict,
        })
    }

    /// Look up an artifact by path
    #[must_use]
    pub fn artifact(&self, path: &str) -> Option<&ManifestArtifact> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    /// Artifact hashes keyed (and therefore sorted) by path
    #[must_use]
    pub fn artifact_hashes(&self) -> BTreeMap<&str, Hash> {
        self.artifacts
            .iter()
            .map(|a| (a.path.as_str(), a.sha256))
            .collect()
    }

    /// Merkle root recomputed from the listed artifact hashes
    #[must_use]
    pub fn computed_merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.artifacts.iter().map(|a| a.sha256).collect();
        compute_root(&leaves)
    }
}

/// Typed accessors over a JSON object that report failures against a file
/// and a field path.
pub(crate) struct Fields<'a> {
    obj: &'a Map<String, Value>,
    source: &'a Path,
    prefix: String,
}

impl<'a> Fields<'a> {
    /// Accessors over a whole document; `label` names it in errors.
    pub(crate) fn root(value: &'a Value, source: &'a Path, label: &str) -> ProofPackResult<Self> {
        Self::with_prefix(value, source, label, String::new())
    }

    /// Accessors over an object nested at `label`; field names are reported
    /// as `label.field`.
    pub(crate) fn nested(value: &'a Value, source: &'a Path, label: &str) -> ProofPackResult<Self> {
        Self::with_prefix(value, source, label, format!("{}.", label))
    }

    fn with_prefix(
        value: &'a Value,
        source: &'a Path,
        label: &str,
        prefix: String,
    ) -> ProofPackResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ProofPackError::validation(source, label, "must be a JSON object")
        })?;
        Ok(Self {
            obj,
            source,
            prefix,
        })
    }

    fn field_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub(crate) fn get(&self, name: &str) -> ProofPackResult<&'a Value> {
        self.obj
            .get(name)
            .ok_or_else(|| ProofPackError::validation(self.source, self.field_name(name), "is missing"))
    }

    pub(crate) fn string(&self, name: &str) -> ProofPackResult<String> {
        self.get(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ProofPackError::validation(self.source, self.field_name(name), "must be a string")
            })
    }

    pub(crate) fn non_empty_str(&self, name: &str) -> ProofPackResult<String> {
        let s = self.string(name)?;
        if s.is_empty() {
            return Err(ProofPackError::validation(
                self.source,
                self.field_name(name),
                "must not be empty",
            ));
        }
        Ok(s)
    }

    pub(crate) fn array(&self, name: &str) -> ProofPackResult<&'a Vec<Value>> {
        self.get(name)?.as_array().ok_or_else(|| {
            ProofPackError::validation(self.source, self.field_name(name), "must be an array")
        })
    }

    pub(crate) fn count(&self, name: &str) -> ProofPackResult<usize> {
        self.get(name)?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                ProofPackError::validation(
                    self.source,
                    self.field_name(name),
                    "must be a non-negative integer",
                )
            })
    }

    pub(crate) fn hash(&self, name: &str) -> ProofPackResult<Hash> {
        let raw = self.string(name)?;
        parse_hash(&raw, self.source, &self.field_name(name))
    }
}

pub(crate) fn parse_hash(raw: &str, source: &Path, field: &str) -> ProofPackResult<Hash> {
    if !is_hex_hash(raw) {
        return Err(ProofPackError::Format {
            path: source.to_path_buf(),
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    Hash::from_hex(raw).map_err(|_| ProofPackError::Format {
        path: source.to_path_buf(),
        field: field.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn h(s: &str) -> String {
        Hash::compute(s.as_bytes()).to_hex()
    }

    fn valid() -> Value {
        json!({
            "run_id": "run-001",
            "merkle_root": h("root"),
            "artifacts": [
                {"path": "10-plan/plan.json", "sha256": h("a")},
                {"path": "20-draft/draft.md", "sha256": h("b")}
            ],
            "stages_completed": ["10-plan", "20-draft"],
            "seed": "42",
            "verdict": "PASS",
            "extra_field": {"ignored": true}
        })
    }

    fn src() -> &'static Path {
        Path::new("run/manifest.json")
    }

    #[test]
    fn test_parses_valid_manifest() {
        let m = Manifest::from_value(&valid(), src()).unwrap();
        assert_eq!(m.run_id, "run-001");
        assert_eq!(m.artifacts.len(), 2);
        assert_eq!(m.stages_completed, vec!["10-plan", "20-draft"]);
        assert_eq!(m.artifact("20-draft/draft.md").unwrap().sha256.to_hex(), h("b"));
    }

    #[test]
    fn test_missing_field_named() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("seed");
        match Manifest::from_value(&v, src()).unwrap_err() {
            ProofPackError::Validation { field, .. } => assert_eq!(field, "seed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_artifact_hash_is_format_error() {
        let mut v = valid();
        v["artifacts"][1]["sha256"] = json!("DEADBEEF");
        match Manifest::from_value(&v, src()).unwrap_err() {
            ProofPackError::Format { field, value, .. } => {
                assert_eq!(field, "artifacts[1].sha256");
                assert_eq!(value, "DEADBEEF");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_uppercase_merkle_root_rejected() {
        let mut v = valid();
        v["merkle_root"] = json!(h("root").to_uppercase());
        assert!(matches!(
            Manifest::from_value(&v, src()),
            Err(ProofPackError::Format { .. })
        ));
    }

    #[test]
    fn test_numeric_seed_rejected() {
        let mut v = valid();
        v["seed"] = json!(42);
        assert!(matches!(
            Manifest::from_value(&v, src()),
            Err(ProofPackError::Validation { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_absolute_paths_rejected() {
        let mut v = valid();
        v["artifacts"][1]["path"] = json!("10-plan/plan.json");
        assert!(Manifest::from_value(&v, src()).is_err());

        let mut v = valid();
        v["artifacts"][0]["path"] = json!("/etc/passwd");
        assert!(Manifest::from_value(&v, src()).is_err());
    }

    #[test]
    fn test_non_string_stage_rejected() {
        let mut v = valid();
        v["stages_completed"] = json!(["ok", 3]);
        match Manifest::from_value(&v, src()).unwrap_err() {
            ProofPackError::Validation { field, .. } => assert_eq!(field, "stages_completed[1]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_computed_merkle_root_uses_listed_order() {
        let m = Manifest::from_value(&valid(), src()).unwrap();
        let a = Hash::compute(b"a");
        let b = Hash::compute(b"b");
        assert_eq!(m.computed_merkle_root(), a.chain(&b));
    }
}
