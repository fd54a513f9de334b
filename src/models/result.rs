//! Outcome of one initialization, produced once and reported once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ErrorKind, InitializerError};

/// Opaque key-value data surfaced to the rest of the deployment
pub type TaskPayload = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationResult {
    pub status: OutcomeStatus,
    pub payload: TaskPayload,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl InitializationResult {
    pub fn success(payload: TaskPayload) -> Self {
        Self {
            status: OutcomeStatus::Success,
            payload,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            payload: TaskPayload::new(),
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

impl From<InitializerError> for InitializationResult {
    fn from(error: InitializerError) -> Self {
        Self::failed(error.kind(), error.to_string())
    }
}
