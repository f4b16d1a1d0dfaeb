//! Proof pack read errors.
//!
//! Every variant names the file it came from. None of these are retried; a
//! malformed run directory stays malformed.

use std::path::PathBuf;

/// Result alias for proof pack reads
pub type ProofPackResult<T> = Result<T, ProofPackError>;

/// Errors raised while loading a run directory
#[derive(Debug, thiserror::Error)]
pub enum ProofPackError {
    /// File could not be read
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON
    #[error("invalid JSON in {}: {message}", path.display())]
    Json {
        /// File that failed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Required field missing or of the wrong type
    #[error("validation failed in {}: field '{field}' {reason}", path.display())]
    Validation {
        /// File that failed
        path: PathBuf,
        /// Field path inside the document, e.g. `artifacts[2].path`
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Hash field not matching `^[a-f0-9]{64}$`
    #[error("format error in {}: field '{field}' is not a 64-char lowercase hex hash: '{value}'", path.display())]
    Format {
        /// File that failed
        path: PathBuf,
        /// Field path inside the document
        field: String,
        /// Offending value
        value: String,
    },

    /// Artifact path is absolute or climbs out of the run directory
    #[error("artifact path '{artifact}' escapes run directory {}", run_dir.display())]
    UnsafeArtifactPath {
        /// Run directory
        run_dir: PathBuf,
        /// Requested artifact path
        artifact: String,
    },
}

impl ProofPackError {
    /// The file (or run directory) the error refers to
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. }
            | Self::Json { path, .. }
            | Self::Validation { path, .. }
            | Self::Format { path, .. } => path,
            Self::UnsafeArtifactPath { run_dir, .. } => run_dir,
        }
    }

    /// True if the underlying cause is a missing file
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    pub(crate) fn validation(
        path: impl Into<PathBuf>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            path: path.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_names_path_and_field() {
        let err = ProofPackError::validation("/runs/a/manifest.json", "seed", "is missing");
        let s = err.to_string();
        assert!(s.contains("/runs/a/manifest.json"));
        assert!(s.contains("'seed'"));
        assert!(s.contains("is missing"));
    }

    #[test]
    fn test_format_display() {
        let err = ProofPackError::Format {
            path: PathBuf::from("manifest.json"),
            field: "merkle_root".to_string(),
            value: "XYZ".to_string(),
        };
        assert!(err.to_string().contains("'XYZ'"));
        assert_eq!(err.path(), std::path::Path::new("manifest.json"));
    }

    #[test]
    fn test_is_not_found() {
        let err = ProofPackError::Io {
            path: PathBuf::from("missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());
        assert!(!ProofPackError::validation("x", "y", "z").is_not_found());
    }
}
