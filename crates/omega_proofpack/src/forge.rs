//! Optional quality report written by the forge stage.
//!
//! The report is an open bag of fields. Only the numeric metrics listed in
//! [`METRIC_FIELDS`] are ever read from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metrics compared by qualitative drift, in reporting order
pub const METRIC_FIELDS: [&str; 15] = [
    "composite_score",
    "emotion_score",
    "quality_score",
    "M1",
    "M2",
    "M3",
    "M4",
    "M5",
    "M6",
    "M7",
    "M8",
    "M9",
    "M10",
    "M11",
    "M12",
];

/// `50-forge/forge-report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForgeReport(Value);

impl ForgeReport {
    /// Wrap a parsed document
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Raw document
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Numeric metric by name.
    ///
    /// Looked up at the top level first, then inside a nested `metrics`
    /// object. Non-numeric values count as absent.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.0
            .get(name)
            .and_then(Value::as_f64)
            .or_else(|| {
                self.0
                    .get("metrics")
                    .and_then(|m| m.get(name))
                    .and_then(Value::as_f64)
            })
    }

    /// Every known metric present in the report, in [`METRIC_FIELDS`] order
    #[must_use]
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        METRIC_FIELDS
            .iter()
            .filter_map(|name| self.metric(name).map(|v| (*name, v)))
            .collect()
    }
}

impl From<Value> for ForgeReport {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_metric() {
        let r = ForgeReport::new(json!({"composite_score": 0.85}));
        assert_eq!(r.metric("composite_score"), Some(0.85));
        assert_eq!(r.metric("emotion_score"), None);
    }

    #[test]
    fn test_nested_metrics_object() {
        let r = ForgeReport::new(json!({"metrics": {"M3": 4, "M7": "n/a"}}));
        assert_eq!(r.metric("M3"), Some(4.0));
        assert_eq!(r.metric("M7"), None);
    }

    #[test]
    fn test_top_level_wins() {
        let r = ForgeReport::new(json!({"M1": 1.0, "metrics": {"M1": 2.0}}));
        assert_eq!(r.metric("M1"), Some(1.0));
    }

    #[test]
    fn test_metrics_in_fixed_order() {
        let r = ForgeReport::new(json!({
            "M12": 12,
            "quality_score": 0.5,
            "composite_score": 0.9,
            "unrelated": 3
        }));
        let names: Vec<&str> = r.metrics().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["composite_score", "quality_score", "M12"]);
    }
}
