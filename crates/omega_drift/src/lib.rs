//! OMEGA Drift Detection
//!
//! Classifies the divergence between two runs as functional, qualitative
//! or structural, with severities driven by caller-supplied thresholds.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod detector;
pub mod report;

pub use classify::{DriftDetail, DriftLevel, DriftType, DriftVerdict, StructuralChange};
pub use config::{ConfigError, GovConfig};
pub use detector::{DriftDetector, detect_drift};
pub use report::DriftReport;
