//! Drift report and its audit event.

use crate::classify::{DriftDetail, DriftLevel, DriftType, DriftVerdict};
use chrono::{DateTime, Utc};
use omega_log::{AuditEvent, AuditLog, ChainError, EventType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of comparing two runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Baseline run id
    pub baseline: String,
    /// Candidate run id
    pub candidate: String,
    /// Highest severity across details
    pub level: DriftLevel,
    /// Categories present, sorted
    pub types: Vec<DriftType>,
    /// Functional (by path), then qualitative (metric order), then
    /// structural
    pub details: Vec<DriftDetail>,
    /// Verdict derived from `level`
    pub verdict: DriftVerdict,
}

impl DriftReport {
    /// Aggregate classified details, dropping those with no drift.
    #[must_use]
    pub fn from_details(
        baseline: impl Into<String>,
        candidate: impl Into<String>,
        details: Vec<DriftDetail>,
    ) -> Self {
        let details: Vec<DriftDetail> = details
            .into_iter()
            .filter(|d| d.level != DriftLevel::NoDrift)
            .collect();
        let level = details
            .iter()
            .map(|d| d.level)
            .max()
            .unwrap_or(DriftLevel::NoDrift);
        let types: BTreeSet<DriftType> = details.iter().map(|d| d.drift_type).collect();

        Self {
            baseline: baseline.into(),
            candidate: candidate.into(),
            level,
            types: types.into_iter().collect(),
            details,
            verdict: level.verdict(),
        }
    }

    /// True when no drift was found
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.level == DriftLevel::NoDrift
    }

    /// Details of one category
    pub fn details_of(&self, drift_type: DriftType) -> impl Iterator<Item = &DriftDetail> {
        self.details.iter().filter(move |d| d.drift_type == drift_type)
    }

    /// Append a `drift_event` carrying this report to `log`.
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be canonicalized
    pub fn record<'a>(
        &self,
        log: &'a mut AuditLog,
        timestamp: DateTime<Utc>,
    ) -> Result<&'a AuditEvent, ChainError> {
        log.append(EventType::DriftEvent, timestamp, self)
    }
}
