//! Error types for the resource initializer.
//!

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigurationError;

/// Failure taxonomy carried on every failed result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Target unreachable, potentially transient
    Connectivity,
    /// Target reachable, operation rejected
    Execution,
    /// Handler deadline exceeded
    Timeout,
    /// Callback delivery failed
    ReportingFailure,
    /// Secret could not be resolved or is outside the granted scope
    Credential,
    /// Task or system configuration is unusable
    Configuration,
    /// The dependency resource was not ready when the binding was invoked
    Precondition,
}

impl ErrorKind {
    /// Only connectivity failures are eligible for local retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Connectivity)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connectivity => write!(f, "connectivity"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ReportingFailure => write!(f, "reporting_failure"),
            ErrorKind::Credential => write!(f, "credential"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Precondition => write!(f, "precondition"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InitializerError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("timeout: {operation} did not complete within {timeout:?}")]
    Timeout { operation: String, timeout: Duration },
    #[error("Callback delivery failed for {token}: {reason}")]
    ReportingFailure { token: String, reason: String },
    #[error("Result for {token} was already reported")]
    AlreadyReported { token: String },
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Invalid task configuration: {0}")]
    TaskConfiguration(String),
    #[error("Precondition not met: {0}")]
    Precondition(String),
    #[error("Runtime API error: {0}")]
    Runtime(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl InitializerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InitializerError::Connectivity(_) => ErrorKind::Connectivity,
            InitializerError::Execution(_) => ErrorKind::Execution,
            InitializerError::Timeout { .. } => ErrorKind::Timeout,
            InitializerError::ReportingFailure { .. } | InitializerError::AlreadyReported { .. } => {
                ErrorKind::ReportingFailure
            }
            InitializerError::Credential(_) => ErrorKind::Credential,
            InitializerError::InvalidEvent(_)
            | InitializerError::TaskConfiguration(_)
            | InitializerError::Configuration(_) => ErrorKind::Configuration,
            InitializerError::Precondition(_) => ErrorKind::Precondition,
            InitializerError::Runtime(_) => ErrorKind::Connectivity,
        }
    }

    pub fn reporting_failure(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReportingFailure {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for InitializerError {
    fn from(error: serde_json::Error) -> Self {
        InitializerError::InvalidEvent(format!("JSON serialization error: {error}"))
    }
}

pub type InitializerResult<T> = std::result::Result<T, InitializerError>;
