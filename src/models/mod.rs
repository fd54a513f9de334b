//! # Data Layer
//!
//! Per-invocation values passed between the binding, the lifecycle handler, the
//! task runner, and the signal reporter. Nothing here outlives one invocation.

pub mod credential;
pub mod request;
pub mod result;

pub use credential::{Credential, CredentialLocator};
pub use request::{CallbackTarget, CorrelationToken, InitializationRequest, LifecycleEvent, TaskConfig};
pub use result::{InitializationResult, OutcomeStatus, TaskPayload};
