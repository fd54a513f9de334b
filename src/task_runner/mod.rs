//! # Task Runner
//!
//! The pluggable unit of work that performs the actual initialization against the
//! target resource.
//!
//! ## Contract
//!
//! - `run` must be idempotent: Update events and transient retries both re-invoke it.
//! - Unreachable targets fail with [`TaskError::Connectivity`] and are the only
//!   failures [`with_connectivity_retry`] will try again.
//! - Targets that reject the operation fail with [`TaskError::Execution`].
//! - Connections and sessions must be released on every exit path, including
//!   cancellation when the lifecycle handler abandons the run.
//!
//! ## Implementations
//!
//! - [`SqlInitializationRunner`]: applies an [`InitScript`] to a MySQL database
//! - [`RetryingRunner`]: wraps any runner with the connectivity retry budget

pub mod retry;
pub mod script;
pub mod sql;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ErrorKind, InitializerError};
use crate::models::{Credential, TaskConfig, TaskPayload};

pub use retry::{with_connectivity_retry, RetryPolicy, RetryingRunner};
pub use script::InitScript;
pub use sql::SqlInitializationRunner;

/// Runner-level failure, narrower than [`InitializerError`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Target could not be reached within the runner's attempt budget
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Target reachable but the operation was rejected
    #[error("Execution error: {0}")]
    Execution(String),

    /// Task configuration is unusable; no I/O was attempted
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Connectivity(_) => ErrorKind::Connectivity,
            TaskError::Execution(_) => ErrorKind::Execution,
            TaskError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<TaskError> for InitializerError {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::Connectivity(msg) => InitializerError::Connectivity(msg),
            TaskError::Execution(msg) => InitializerError::Execution(msg),
            TaskError::Configuration(msg) => InitializerError::TaskConfiguration(msg),
        }
    }
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Idempotent initialization logic invoked by the lifecycle handler
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Apply the initialization and return data to surface to the deployment
    async fn run(&self, config: &TaskConfig, credential: &Credential) -> TaskResult<TaskPayload>;

    /// Name used in logs
    fn runner_name(&self) -> &'static str {
        "task_runner"
    }
}
