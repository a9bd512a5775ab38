use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3ingest-rs.
///
/// Per-item failures (`Format`, `Transfer`) are contained at the message
/// boundary by the dispatcher and turned into outcomes. Only `TopLevel`
/// escalates out of a batch invocation.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 1: General errors (Format, Transfer, TopLevel, AwsSdk, Io, Report)
/// - 2: Configuration errors (InvalidConfig)
/// - 3: Partial failure (some items moved, some failed)
#[derive(Error, Debug, PartialEq)]
pub enum S3IngestError {
    /// The message is neither a direct event nor a recognized wrapped event.
    #[error("Unrecognized message format: {0}")]
    Format(String),

    /// Copy or delete kept failing until the retry budget ran out.
    #[error("Transfer of '{key}' failed after {attempts} attempts: {message}")]
    Transfer {
        key: String,
        attempts: u32,
        message: String,
    },

    /// The batch container itself could not be enumerated.
    #[error("Batch setup failed: {0}")]
    TopLevel(String),

    /// Configuration error (non-retryable).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// AWS SDK error.
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Report generation error.
    #[error("Report error: {0}")]
    Report(String),

    /// Partial failure during a batch.
    #[error("Partial failure: {succeeded} succeeded, {failed} failed")]
    PartialFailure { succeeded: u64, failed: u64 },
}

impl S3IngestError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            S3IngestError::InvalidConfig(_) => 2,
            S3IngestError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }
}

/// Check if an anyhow::Error wraps a format error.
pub fn is_format_error(e: &Error) -> bool {
    matches!(e.downcast_ref::<S3IngestError>(), Some(S3IngestError::Format(_)))
}

/// Check if an anyhow::Error wraps a partial batch failure.
pub fn is_partial_failure(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3IngestError>(),
        Some(S3IngestError::PartialFailure { .. })
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3IngestError>() {
        return err.exit_code();
    }
    1
}
