//! Governance thresholds.
//!
//! Thresholds are always supplied by the caller, usually from a policy
//! file, so there is no `Default`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Drift thresholds for qualitative metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovConfig {
    /// `|delta|` above this is soft drift
    #[serde(rename = "DRIFT_SOFT")]
    pub drift_soft: f64,
    /// `|delta|` above this is hard drift
    #[serde(rename = "DRIFT_HARD")]
    pub drift_hard: f64,
}

impl GovConfig {
    /// Create and validate
    ///
    /// # Errors
    ///
    /// See [`GovConfig::validate`]
    pub fn new(drift_soft: f64, drift_hard: f64) -> Result<Self, ConfigError> {
        let config = Self {
            drift_soft,
            drift_hard,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON. Keys other than the thresholds are ignored so the
    /// same policy document can carry unrelated settings.
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON or invalid thresholds
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is invalid
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Check that thresholds are usable
    ///
    /// # Errors
    ///
    /// Returns error if a threshold is non-finite or negative, or if
    /// `DRIFT_SOFT > DRIFT_HARD`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("DRIFT_SOFT", self.drift_soft), ("DRIFT_HARD", self.drift_hard)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.drift_soft > self.drift_hard {
            return Err(ConfigError::SoftAboveHard {
                soft: self.drift_soft,
                hard: self.drift_hard,
            });
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {}: {message}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        message: String,
    },
    /// Not valid JSON or missing a threshold
    #[error("invalid config: {0}")]
    Parse(String),
    /// Threshold negative or non-finite
    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidThreshold {
        /// Threshold name
        name: &'static str,
        /// Offending value
        value: f64,
    },
    /// Soft threshold larger than hard threshold
    #[error("DRIFT_SOFT ({soft}) must not exceed DRIFT_HARD ({hard})")]
    SoftAboveHard {
        /// Soft threshold
        soft: f64,
        /// Hard threshold
        hard: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_json_wire_names() {
        let c = GovConfig::from_json_str(r#"{"DRIFT_SOFT": 0.05, "DRIFT_HARD": 0.1, "OTHER": 3}"#)
            .unwrap();
        assert_eq!(c, GovConfig::new(0.05, 0.1).unwrap());
    }

    #[test]
    fn test_missing_threshold_is_parse_error() {
        assert!(matches!(
            GovConfig::from_json_str(r#"{"DRIFT_SOFT": 0.05}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(matches!(
            GovConfig::new(-0.1, 0.1),
            Err(ConfigError::InvalidThreshold { name: "DRIFT_SOFT", .. })
        ));
        assert!(matches!(
            GovConfig::new(0.1, f64::INFINITY),
            Err(ConfigError::InvalidThreshold { name: "DRIFT_HARD", .. })
        ));
        assert!(matches!(
            GovConfig::new(0.2, 0.1),
            Err(ConfigError::SoftAboveHard { .. })
        ));
        assert!(GovConfig::new(0.1, 0.1).is_ok());
    }

    #[test]
    fn test_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"DRIFT_SOFT": 0.02, "DRIFT_HARD": 0.08}"#).unwrap();
        let c = GovConfig::from_file(file.path()).unwrap();
        assert_eq!(c.drift_hard, 0.08);

        let missing = GovConfig::from_file(Path::new("/nonexistent/gov.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
