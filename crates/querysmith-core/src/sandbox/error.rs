//! Error types for the sandbox module.

/// Errors produced by the sandbox layer itself.
///
/// Faults of the candidate program are not errors at this level; they are
/// classified into an [`ExecutionOutcome`](crate::domain::ExecutionOutcome).
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("execution cancelled by caller")]
    Cancelled,

    #[error("invalid sandbox limits: {0}")]
    InvalidLimits(String),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
