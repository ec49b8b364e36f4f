//! All error types for the txnative crate.
//!
//! These are returned from every fallible operation (network, storage,
//! parsing, cache updates, configuration). `translate` never returns them;
//! they surface through refresh reports, push results and logs.

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::types::JobError;

/// Why a pushed job did not reach `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFailure {
    /// The server finished the job with status `failed`.
    Rejected,
    /// The job was still pending when the polling budget ran out.
    TimedOut,
    /// Polling was cancelled by the caller.
    Cancelled,
}

impl Display for JobFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            JobFailure::Rejected => write!(f, "server reported failure"),
            JobFailure::TimedOut => write!(f, "timed out while the job was still pending"),
            JobFailure::Cancelled => write!(f, "polling cancelled"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("request rejected by CDS (HTTP {status}): {message}")]
    RemoteRejection { status: u16, message: String },

    #[error("job failed: {reason}")]
    JobFailed {
        reason: JobFailure,
        errors: Vec<JobError>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid plurals configuration: {0}")]
    InvalidPlurals(String),

    #[error("plural type `{0}` is not supported")]
    NonSupportedPluralType(String),

    #[error("cache is read-only")]
    CacheWriteRejected,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Creates a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network(message.into())
    }

    /// Creates a new remote rejection for a non-retryable HTTP status.
    pub fn rejection(status: u16, message: impl Into<String>) -> Self {
        Error::RemoteRejection {
            status,
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Server-side errors attached to a failed job, empty for everything else.
    pub fn job_errors(&self) -> &[JobError] {
        match self {
            Error::JobFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}
