// Error taxonomy for enumerate / fetch / write.

use std::path::PathBuf;
use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    /// Credential lacks the monitoring read scope on the project.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Project unknown or nothing to list. Callers treat this as an empty result.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(
        "response size limit exceeded for {metric} over {duration_secs}s at step {step_secs}s; \
         widen --step or shorten --duration"
    )]
    QuotaExceeded {
        metric: String,
        duration_secs: u64,
        step_secs: u64,
    },

    #[error("cannot write report to {}: {reason}", path.display())]
    IoWrite { path: PathBuf, reason: String },

    #[error("invalid credentials in {}: {reason}", path.display())]
    Credential { path: PathBuf, reason: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("report window of {duration_secs}s ending at {end} is out of range")]
    WindowOutOfRange { duration_secs: u64, end: String },

    #[error("run exceeded deadline of {secs}s")]
    DeadlineExceeded { secs: u64 },

    #[error("monitoring API error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ReportError {
    /// Backend signalled resource exhaustion; the fetcher may narrow and retry.
    pub fn is_quota(&self) -> bool {
        matches!(self, ReportError::QuotaExceeded { .. })
    }

    /// Errors that abort a whole project run rather than a single instance.
    pub fn is_project_fatal(&self) -> bool {
        matches!(
            self,
            ReportError::Authorization(_)
                | ReportError::IoWrite { .. }
                | ReportError::Credential { .. }
                | ReportError::DeadlineExceeded { .. }
                | ReportError::WindowOutOfRange { .. }
        )
    }

    pub fn io_write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ReportError::IoWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn credential(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ReportError::Credential {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
