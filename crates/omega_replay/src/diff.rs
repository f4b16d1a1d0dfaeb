//! Order-independent comparison of two runs, artifact by artifact.
//!
//! `compare_runs(a, b)` and `compare_runs(b, a)` mirror each other: the
//! same paths differ and every `MISSING_LEFT` in one direction is a
//! `MISSING_RIGHT` in the other.

use chrono::{DateTime, Utc};
use omega_core::Hash;
use omega_log::{AuditEvent, AuditLog, ChainError, EventType};
use omega_proofpack::{ProofPackData, ProofPackError, read_proof_pack};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Per-artifact comparison status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    /// Same hash on both sides
    Identical,
    /// Different hashes
    Different,
    /// Only in the right run
    MissingLeft,
    /// Only in the left run
    MissingRight,
}

/// One artifact's comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDiff {
    /// Artifact path
    pub path: String,
    /// Status
    pub status: ArtifactStatus,
    /// Left hash, if present
    pub left_hash: Option<Hash>,
    /// Right hash, if present
    pub right_hash: Option<Hash>,
}

/// Counts by status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Distinct paths across both runs
    pub total: usize,
    /// Identical artifacts
    pub identical: usize,
    /// Artifacts with differing hashes
    pub different: usize,
    /// Artifacts only in the right run
    pub missing_left: usize,
    /// Artifacts only in the left run
    pub missing_right: usize,
}

/// One metric on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    /// Metric name
    pub metric: String,
    /// Left value
    pub left: f64,
    /// Right value
    pub right: f64,
    /// `right - left`
    pub delta: f64,
}

/// Metrics present in both forge reports, in fixed metric order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComparison {
    /// Compared metrics
    pub metrics: Vec<MetricComparison>,
}

impl ScoreComparison {
    fn between(left: &ProofPackData, right: &ProofPackData) -> Option<Self> {
        let (Some(l), Some(r)) = (&left.forge_report, &right.forge_report) else {
            return None;
        };
        let metrics = l
            .metrics()
            .into_iter()
            .filter_map(|(metric, left)| {
                let right = r.metric(metric)?;
                Some(MetricComparison {
                    metric: metric.to_string(),
                    left,
                    right,
                    delta: right - left,
                })
            })
            .collect();
        Some(Self { metrics })
    }

    /// Look up a metric
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

/// Result of comparing two runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Left run id
    pub left_run_id: String,
    /// Right run id
    pub right_run_id: String,
    /// One entry per path, sorted by path
    pub artifacts: Vec<ArtifactDiff>,
    /// Counts by status
    pub summary: DiffSummary,
    /// Present only when both runs carry a forge report. `None` means not
    /// applicable, never zero.
    pub score_comparison: Option<ScoreComparison>,
}

impl DiffResult {
    /// True when every artifact is identical
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.summary.identical == self.summary.total
    }

    /// Paths with a given status
    pub fn paths_with(&self, status: ArtifactStatus) -> impl Iterator<Item = &str> {
        self.artifacts
            .iter()
            .filter(move |a| a.status == status)
            .map(|a| a.path.as_str())
    }

    /// Append a `diff_event` carrying this result to `log`.
    ///
    /// # Errors
    ///
    /// Returns error if the result cannot be canonicalized
    pub fn record<'a>(
        &self,
        log: &'a mut AuditLog,
        timestamp: DateTime<Utc>,
    ) -> Result<&'a AuditEvent, ChainError> {
        log.append(EventType::DiffEvent, timestamp, self)
    }
}

/// Run comparison errors
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Fewer than two runs supplied
    #[error("at least 2 runs are required for comparison, got {0}")]
    TooFewRuns(usize),
    /// A run could not be loaded
    #[error(transparent)]
    ProofPack(#[from] ProofPackError),
}

/// Compare two runs artifact by artifact
#[must_use]
pub fn compare_runs(left: &ProofPackData, right: &ProofPackData) -> DiffResult {
    let l = left.manifest.artifact_hashes();
    let r = right.manifest.artifact_hashes();
    let paths: BTreeSet<&str> = l.keys().chain(r.keys()).copied().collect();

    let mut summary = DiffSummary::default();
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        let (left_hash, right_hash) = (l.get(path).copied(), r.get(path).copied());
        let status = match (left_hash, right_hash) {
            (Some(a), Some(b)) if a == b => ArtifactStatus::Identical,
            (Some(_), Some(_)) => ArtifactStatus::Different,
            (None, _) => ArtifactStatus::MissingLeft,
            (Some(_), None) => ArtifactStatus::MissingRight,
        };
        match status {
            ArtifactStatus::Identical => summary.identical += 1,
            ArtifactStatus::Different => summary.different += 1,
            ArtifactStatus::MissingLeft => summary.missing_left += 1,
            ArtifactStatus::MissingRight => summary.missing_right += 1,
        }
        artifacts.push(ArtifactDiff {
            path: path.to_string(),
            status,
            left_hash,
            right_hash,
        });
    }
    summary.total = artifacts.len();

    debug!(
        left = %left.run_id,
        right = %right.run_id,
        total = summary.total,
        different = summary.different,
        missing_left = summary.missing_left,
        missing_right = summary.missing_right,
        "compared runs"
    );

    DiffResult {
        left_run_id: left.run_id.clone(),
        right_run_id: right.run_id.clone(),
        artifacts,
        summary,
        score_comparison: ScoreComparison::between(left, right),
    }
}

/// Compare each run with the next one: `runs[i]` vs `runs[i + 1]`.
///
/// # Errors
///
/// [`DiffError::TooFewRuns`] for fewer than two runs
pub fn compare_multiple_runs(runs: &[ProofPackData]) -> Result<Vec<DiffResult>, DiffError> {
    if runs.len() < 2 {
        return Err(DiffError::TooFewRuns(runs.len()));
    }
    let results: Vec<DiffResult> = runs
        .windows(2)
        .map(|pair| compare_runs(&pair[0], &pair[1]))
        .collect();
    info!(runs = runs.len(), comparisons = results.len(), "compared run sequence");
    Ok(results)
}

/// Load two run directories and compare them
///
/// # Errors
///
/// Returns error if either run cannot be loaded
pub fn compare_run_dirs(left: &Path, right: &Path) -> Result<DiffResult, DiffError> {
    let l = read_proof_pack(left)?;
    let r = read_proof_pack(right)?;
    Ok(compare_runs(&l, &r))
}
