//! Severity classifiers for each drift category.
//!
//! Each classifier looks at one observation and returns a detail citing the
//! rule that produced it. Details classified [`DriftLevel::NoDrift`] are
//! dropped later by the detector.

use crate::config::GovConfig;
use omega_core::Hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Drift category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftType {
    /// Artifact bytes changed, appeared or disappeared
    Functional,
    /// A quality metric moved
    Qualitative,
    /// Run shape changed (merkle root, stages, verdict)
    Structural,
}

/// Severity, ordered from none to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftLevel {
    /// Nothing to report
    NoDrift,
    /// Worth a look
    Soft,
    /// Outputs differ materially
    Hard,
    /// Pipeline outcome changed
    Critical,
}

/// Verdict derived from the overall level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftVerdict {
    /// No drift
    Pass,
    /// Soft drift only
    Warn,
    /// Hard or critical drift
    Fail,
}

impl DriftLevel {
    /// Map a level to its verdict
    #[must_use]
    pub const fn verdict(self) -> DriftVerdict {
        match self {
            Self::NoDrift => DriftVerdict::Pass,
            Self::Soft => DriftVerdict::Warn,
            Self::Hard | Self::Critical => DriftVerdict::Fail,
        }
    }
}

/// Rule texts cited by details
pub mod rules {
    /// Stored hashes differ
    pub const HASH_MISMATCH: &str = "sha256(baseline) != sha256(candidate)";
    /// Path only in baseline
    pub const ARTIFACT_REMOVED: &str = "artifact missing in candidate";
    /// Path only in candidate
    pub const ARTIFACT_ADDED: &str = "artifact missing in baseline";
    /// Above hard threshold
    pub const ABOVE_HARD: &str = "|delta| > DRIFT_HARD";
    /// Above soft threshold
    pub const ABOVE_SOFT: &str = "|delta| > DRIFT_SOFT";
    /// Within tolerance
    pub const WITHIN_SOFT: &str = "|delta| <= DRIFT_SOFT";
    /// Merkle roots differ
    pub const MERKLE_ROOT_CHANGED: &str = "merkle_root changed";
    /// Fewer stages completed
    pub const STAGES_DECREASED: &str = "stages_completed.length decreased";
    /// More stages completed
    pub const STAGES_INCREASED: &str = "stages_completed.length increased";
    /// Verdict differs
    pub const VERDICT_CHANGED: &str = "verdict changed";
}

/// One observed divergence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetail {
    /// Category
    #[serde(rename = "type")]
    pub drift_type: DriftType,
    /// Artifact path, metric name or manifest field
    pub path: String,
    /// Value on the baseline side (`null` if absent)
    pub baseline_value: Value,
    /// Value on the candidate side (`null` if absent)
    pub candidate_value: Value,
    /// `candidate - baseline` for numeric observations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delta: Option<f64>,
    /// Severity
    pub level: DriftLevel,
    /// Rule that produced the severity
    pub rule: String,
}

fn hash_value(hash: Option<Hash>) -> Value {
    hash.map_or(Value::Null, |h| Value::String(h.to_hex()))
}

/// Compare one artifact's hashes across runs.
///
/// Any difference, including presence on one side only, is hard drift.
#[must_use]
pub fn classify_functional(
    path: &str,
    baseline: Option<Hash>,
    candidate: Option<Hash>,
) -> Option<DriftDetail> {
    let rule = match (baseline, candidate) {
        (Some(b), Some(c)) if b == c => return None,
        (None, None) => return None,
        (Some(_), Some(_)) => rules::HASH_MISMATCH,
        (Some(_), None) => rules::ARTIFACT_REMOVED,
        (None, Some(_)) => rules::ARTIFACT_ADDED,
    };
    Some(DriftDetail {
        drift_type: DriftType::Functional,
        path: path.to_string(),
        baseline_value: hash_value(baseline),
        candidate_value: hash_value(candidate),
        delta: None,
        level: DriftLevel::Hard,
        rule: rule.to_string(),
    })
}

/// Severity of a numeric delta against the configured thresholds.
///
/// Comparisons are strict: a delta equal to a threshold stays below it.
#[must_use]
pub fn classify_delta(delta: f64, config: &GovConfig) -> (DriftLevel, &'static str) {
    let magnitude = delta.abs();
    if magnitude > config.drift_hard {
        (DriftLevel::Hard, rules::ABOVE_HARD)
    } else if magnitude > config.drift_soft {
        (DriftLevel::Soft, rules::ABOVE_SOFT)
    } else {
        (DriftLevel::NoDrift, rules::WITHIN_SOFT)
    }
}

/// Compare one metric across runs; `None` when the values are equal.
#[must_use]
pub fn classify_qualitative(
    metric: &str,
    baseline: f64,
    candidate: f64,
    config: &GovConfig,
) -> Option<DriftDetail> {
    let delta = candidate - baseline;
    if delta == 0.0 {
        return None;
    }
    let (level, rule) = classify_delta(delta, config);
    Some(DriftDetail {
        drift_type: DriftType::Qualitative,
        path: metric.to_string(),
        baseline_value: Value::from(baseline),
        candidate_value: Value::from(candidate),
        delta: Some(delta),
        level,
        rule: rule.to_string(),
    })
}

/// Structural observation fed to [`classify_structural`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructuralChange<'a> {
    /// `manifest.merkle_root`
    MerkleRoot(Hash, Hash),
    /// `manifest.stages_completed.len()`
    StageCount(usize, usize),
    /// `manifest.verdict`
    Verdict(&'a str, &'a str),
}

/// Classify a structural observation; `None` when nothing changed.
#[must_use]
pub fn classify_structural(change: StructuralChange<'_>) -> Option<DriftDetail> {
    let (path, baseline_value, candidate_value, delta, level, rule) = match change {
        StructuralChange::MerkleRoot(b, c) if b != c => (
            "merkle_root",
            Value::from(b.to_hex()),
            Value::from(c.to_hex()),
            None,
            DriftLevel::Hard,
            rules::MERKLE_ROOT_CHANGED,
        ),
        StructuralChange::StageCount(b, c) if b != c => {
            let (level, rule) = if c < b {
                (DriftLevel::Hard, rules::STAGES_DECREASED)
            } else {
                (DriftLevel::Soft, rules::STAGES_INCREASED)
            };
            (
                "stages_completed",
                Value::from(b),
                Value::from(c),
                Some(c as f64 - b as f64),
                level,
                rule,
            )
        }
        StructuralChange::Verdict(b, c) if b != c => (
            "verdict",
            Value::from(b),
            Value::from(c),
            None,
            DriftLevel::Critical,
            rules::VERDICT_CHANGED,
        ),
        _ => return None,
    };
    Some(DriftDetail {
        drift_type: DriftType::Structural,
        path: path.to_string(),
        baseline_value,
        candidate_value,
        delta,
        level,
        rule: rule.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(soft: f64, hard: f64) -> GovConfig {
        GovConfig::new(soft, hard).unwrap()
    }

    #[test]
    fn test_level_order_and_verdicts() {
        assert!(DriftLevel::NoDrift < DriftLevel::Soft);
        assert!(DriftLevel::Soft < DriftLevel::Hard);
        assert!(DriftLevel::Hard < DriftLevel::Critical);
        assert_eq!(DriftLevel::NoDrift.verdict(), DriftVerdict::Pass);
        assert_eq!(DriftLevel::Soft.verdict(), DriftVerdict::Warn);
        assert_eq!(DriftLevel::Critical.verdict(), DriftVerdict::Fail);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(DriftLevel::NoDrift).unwrap(), "NO_DRIFT");
        assert_eq!(serde_json::to_value(DriftType::Functional).unwrap(), "FUNCTIONAL");
    }

    #[test]
    fn test_functional_cases() {
        let (h1, h2) = (Hash::compute(b"1"), Hash::compute(b"2"));
        assert!(classify_functional("a.json", Some(h1), Some(h1)).is_none());

        let changed = classify_functional("a.json", Some(h1), Some(h2)).unwrap();
        assert_eq!(changed.rule, rules::HASH_MISMATCH);
        assert_eq!(changed.level, DriftLevel::Hard);

        let removed = classify_functional("a.json", Some(h1), None).unwrap();
        assert_eq!(removed.rule, rules::ARTIFACT_REMOVED);
        assert!(removed.candidate_value.is_null());

        let added = classify_functional("a.json", None, Some(h2)).unwrap();
        assert_eq!(added.rule, rules::ARTIFACT_ADDED);
    }

    #[test]
    fn test_qualitative_thresholds() {
        let c = config(0.05, 0.10);
        let hard = classify_qualitative("composite_score", 0.85, 0.70, &c).unwrap();
        assert_eq!(hard.level, DriftLevel::Hard);
        assert_eq!(hard.rule, "|delta| > DRIFT_HARD");
        assert!(hard.delta.unwrap() < 0.0);

        let soft = classify_qualitative("M1", 0.50, 0.57, &c).unwrap();
        assert_eq!(soft.level, DriftLevel::Soft);

        let tiny = classify_qualitative("M2", 0.50, 0.51, &c).unwrap();
        assert_eq!(tiny.level, DriftLevel::NoDrift);

        assert!(classify_qualitative("M3", 0.5, 0.5, &c).is_none());
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        let c = config(0.25, 0.5);
        assert_eq!(classify_delta(0.5, &c).0, DriftLevel::Soft);
        assert_eq!(classify_delta(-0.25, &c).0, DriftLevel::NoDrift);
    }

    #[test]
    fn test_structural_rules() {
        let (h1, h2) = (Hash::compute(b"1"), Hash::compute(b"2"));
        assert_eq!(
            classify_structural(StructuralChange::MerkleRoot(h1, h2)).unwrap().level,
            DriftLevel::Hard
        );
        assert!(classify_structural(StructuralChange::MerkleRoot(h1, h1)).is_none());
        assert_eq!(
            classify_structural(StructuralChange::StageCount(5, 3)).unwrap().level,
            DriftLevel::Hard
        );
        let grew = classify_structural(StructuralChange::StageCount(3, 5)).unwrap();
        assert_eq!(grew.level, DriftLevel::Soft);
        assert_eq!(grew.delta, Some(2.0));
        assert_eq!(
            classify_structural(StructuralChange::Verdict("PASS", "FAIL")).unwrap().level,
            DriftLevel::Critical
        );
        assert!(classify_structural(StructuralChange::Verdict("PASS", "PASS")).is_none());
    }

    proptest! {
        #[test]
        fn prop_loosening_hard_never_raises_severity(
            delta in -2.0f64..2.0,
            soft in 0.0f64..0.5,
            hard_a in 0.5f64..1.0,
            extra in 0.0f64..1.0,
        ) {
            let tight = config(soft, hard_a);
            let loose = config(soft, hard_a + extra);
            prop_assert!(classify_delta(delta, &loose).0 <= classify_delta(delta, &tight).0);
        }
    }
}
