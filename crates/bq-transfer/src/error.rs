//! Error types for the transfer pipeline.

use std::time::Duration;
use thiserror::Error;

/// Process exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code for authorization and connectivity errors.
pub const EXIT_ACCESS_ERROR: u8 = 2;
/// Process exit code for missing tables, objects or malformed queries.
pub const EXIT_REFERENCE_ERROR: u8 = 3;
/// Process exit code when a load exceeds its malformed-row tolerance.
pub const EXIT_DATA_QUALITY_ERROR: u8 = 4;
/// Process exit code for other remote job failures.
pub const EXIT_JOB_ERROR: u8 = 5;
/// Process exit code when the run timeout elapses.
pub const EXIT_TIMEOUT: u8 = 6;
/// Process exit code for local file errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Process exit code for a cancelled run (SIGINT convention).
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or rejected credential
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Service could not be reached
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Missing table or object, or a malformed query
    #[error("Reference error: {0}")]
    Reference(String),

    /// Load rejected more rows than the configured tolerance
    #[error("Load rejected {bad_records} malformed row(s), tolerance is {max_bad_records}: {message}")]
    DataQuality {
        bad_records: u64,
        max_bad_records: u64,
        message: String,
    },

    /// Remote job finished with an error that has no more specific class
    #[error("Job {job_id} failed ({reason}): {message}")]
    Job {
        job_id: String,
        reason: String,
        message: String,
    },

    /// Run exceeded its timeout
    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    /// Run was cancelled (SIGINT, SIGTERM)
    #[error("Run cancelled")]
    Cancelled,

    /// Pipeline state machine was driven out of order
    #[error("Invalid pipeline transition: {0}")]
    InvalidTransition(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse failure classes operators act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing credential or unreachable service. Fatal, not locally recoverable.
    Authorization,
    /// Missing table or malformed query. A configuration bug.
    Reference,
    /// Malformed rows beyond tolerance. The tolerance is a policy knob.
    DataQuality,
    /// Anything else.
    Other,
}

impl TransferError {
    /// Create a Job error.
    pub fn job(
        job_id: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TransferError::Job {
            job_id: job_id.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Create a Reference error.
    pub fn reference(message: impl Into<String>) -> Self {
        TransferError::Reference(message.into())
    }

    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::Authorization(_) | TransferError::Connectivity(_) => {
                ErrorClass::Authorization
            }
            TransferError::Http(e) if e.is_connect() || e.is_timeout() => ErrorClass::Authorization,
            TransferError::Reference(_) | TransferError::Config(_) => ErrorClass::Reference,
            TransferError::DataQuality { .. } => ErrorClass::DataQuality,
            _ => ErrorClass::Other,
        }
    }

    /// Whether a whole-run retry may be attempted after this error.
    ///
    /// Every step failure is retried uniformly; only cancellation and the
    /// run timeout stop the run outright.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransferError::Cancelled | TransferError::Timeout(_))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            TransferError::Config(_) | TransferError::Yaml(_) => EXIT_CONFIG_ERROR,
            TransferError::Io(_) => EXIT_IO_ERROR,
            TransferError::Timeout(_) => EXIT_TIMEOUT,
            TransferError::Cancelled => EXIT_CANCELLED,
            _ => match self.class() {
                ErrorClass::Authorization => EXIT_ACCESS_ERROR,
                ErrorClass::Reference => EXIT_REFERENCE_ERROR,
                ErrorClass::DataQuality => EXIT_DATA_QUALITY_ERROR,
                ErrorClass::Other => EXIT_JOB_ERROR,
            },
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TransferError::Config("x".into()).exit_code(), 1);
        assert_eq!(TransferError::Authorization("x".into()).exit_code(), 2);
        assert_eq!(TransferError::Connectivity("x".into()).exit_code(), 2);
        assert_eq!(TransferError::reference("x").exit_code(), 3);
        let dq = TransferError::DataQuality {
            bad_records: 2,
            max_bad_records: 1,
            message: "bad".into(),
        };
        assert_eq!(dq.exit_code(), 4);
        assert_eq!(TransferError::job("j", "backendError", "boom").exit_code(), 5);
        assert_eq!(TransferError::Timeout(Duration::from_secs(1)).exit_code(), 6);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(TransferError::from(io).exit_code(), 7);
        assert_eq!(TransferError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_retryable() {
        assert!(TransferError::reference("missing").is_retryable());
        assert!(TransferError::Authorization("denied".into()).is_retryable());
        assert!(!TransferError::Cancelled.is_retryable());
        assert!(!TransferError::Timeout(Duration::from_secs(5)).is_retryable());
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = TransferError::reference("table p.d.t not found");
        let text = err.format_detailed();
        assert!(text.starts_with("Error: Reference error: table p.d.t not found"));
    }
}
