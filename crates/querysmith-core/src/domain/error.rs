//! Domain-level error taxonomy for querysmith.

use std::path::PathBuf;

/// Errors produced by context validation, configuration, and artifact I/O.
///
/// These are infrastructure faults of the host. Faults of a candidate
/// program are never represented here; they travel as
/// [`FailureKind`](super::failure::FailureKind) values inside verdicts and
/// outcomes.
#[derive(Debug, thiserror::Error)]
pub enum QsError {
    #[error("invalid execution context: {0}")]
    InvalidContext(String),

    #[error("path is not absolute: {}", .0.display())]
    RelativePath(PathBuf),

    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for querysmith domain operations.
pub type Result<T> = std::result::Result<T, QsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qs_error_display() {
        let err = QsError::InvalidContext("no record directory".to_string());
        assert!(err.to_string().contains("invalid execution context"));

        let err = QsError::RelativePath(PathBuf::from("data/records"));
        assert!(err.to_string().contains("data/records"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = QsError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }
}
