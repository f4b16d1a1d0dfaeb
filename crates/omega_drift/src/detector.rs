//! Drift detection between a baseline and a candidate run.
//!
//! Three passes run in a fixed order: functional (artifacts by path),
//! qualitative (forge metrics in fixed order) and structural (manifest
//! shape). The same inputs always produce the same report.

use crate::classify::{
    DriftDetail, StructuralChange, classify_functional, classify_qualitative, classify_structural,
};
use crate::config::GovConfig;
use crate::report::DriftReport;
use omega_proofpack::{METRIC_FIELDS, ProofPackData};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Applies one set of thresholds to pairs of runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftDetector {
    config: GovConfig,
}

impl DriftDetector {
    /// Create a detector with caller-supplied thresholds
    #[must_use]
    pub fn new(config: GovConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use
    #[must_use]
    pub fn config(&self) -> &GovConfig {
        &self.config
    }

    /// Compare two runs
    #[must_use]
    pub fn detect(&self, baseline: &ProofPackData, candidate: &ProofPackData) -> DriftReport {
        let mut details = functional_pass(baseline, candidate);
        let functional = details.len();

        details.extend(qualitative_pass(baseline, candidate, &self.config));
        let qualitative = details.len() - functional;

        details.extend(structural_pass(baseline, candidate));
        let structural = details.len() - functional - qualitative;

        debug!(functional, qualitative, structural, "drift passes complete");

        let report = DriftReport::from_details(&baseline.run_id, &candidate.run_id, details);
        if report.is_clean() {
            info!(baseline = %report.baseline, candidate = %report.candidate, "no drift");
        } else {
            warn!(
                baseline = %report.baseline,
                candidate = %report.candidate,
                level = ?report.level,
                details = report.details.len(),
                "drift detected"
            );
        }
        report
    }
}

/// Compare two runs with the given thresholds
#[must_use]
pub fn detect_drift(
    baseline: &ProofPackData,
    candidate: &ProofPackData,
    config: &GovConfig,
) -> DriftReport {
    DriftDetector::new(*config).detect(baseline, candidate)
}

fn functional_pass(baseline: &ProofPackData, candidate: &ProofPackData) -> Vec<DriftDetail> {
    let left = baseline.manifest.artifact_hashes();
    let right = candidate.manifest.artifact_hashes();
    let paths: BTreeSet<&str> = left.keys().chain(right.keys()).copied().collect();

    paths
        .into_iter()
        .filter_map(|path| {
            classify_functional(path, left.get(path).copied(), right.get(path).copied())
        })
        .collect()
}

fn qualitative_pass(
    baseline: &ProofPackData,
    candidate: &ProofPackData,
    config: &GovConfig,
) -> Vec<DriftDetail> {
    let (Some(left), Some(right)) = (&baseline.forge_report, &candidate.forge_report) else {
        debug!("forge report missing on at least one side, skipping qualitative pass");
        return Vec::new();
    };

    METRIC_FIELDS
        .iter()
        .filter_map(|metric| {
            let b = left.metric(metric)?;
            let c = right.metric(metric)?;
            classify_qualitative(metric, b, c, config)
        })
        .collect()
}

fn structural_pass(baseline: &ProofPackData, candidate: &ProofPackData) -> Vec<DriftDetail> {
    let (b, c) = (&baseline.manifest, &candidate.manifest);
    [
        StructuralChange::MerkleRoot(b.merkle_root, c.merkle_root),
        StructuralChange::StageCount(b.stages_completed.len(), c.stages_completed.len()),
        StructuralChange::Verdict(&b.verdict, &c.verdict),
    ]
    .into_iter()
    .filter_map(classify_structural)
    .collect()
}
