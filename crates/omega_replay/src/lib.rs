//! OMEGA Replay Verification
//!
//! Verifies that a replayed run reproduces its baseline and produces
//! stable, order-independent diffs between runs. Both operate on runs
//! already on disk; nothing here re-executes a pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod engine;

pub use diff::{
    ArtifactDiff, ArtifactStatus, DiffError, DiffResult, DiffSummary, MetricComparison,
    ScoreComparison, compare_multiple_runs, compare_run_dirs, compare_runs,
};
pub use engine::{DifferenceType, ReplayConfig, ReplayDifference, ReplayEngine, ReplayResult};
