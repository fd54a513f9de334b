//! Initialization request built by the binding for each trigger event.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::credential::CredentialLocator;

/// Opaque key-value configuration handed to the task runner
pub type TaskConfig = BTreeMap<String, String>;

/// Why the orchestrator was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Create,
    Update,
    Delete,
}

impl LifecycleEvent {
    /// Create and Update run the task; Delete never does
    pub fn runs_task(&self) -> bool {
        !matches!(self, LifecycleEvent::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Create => "Create",
            LifecycleEvent::Update => "Update",
            LifecycleEvent::Delete => "Delete",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier tying one trigger event to its callback response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where and how the result must be reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTarget {
    /// Pre-signed URL the control plane watches
    pub response_url: String,
    pub stack_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: String,
}

/// One invocation's worth of input. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationRequest {
    pub event: LifecycleEvent,
    pub token: CorrelationToken,
    pub credential: CredentialLocator,
    pub config: TaskConfig,
    pub callback: CallbackTarget,
}
