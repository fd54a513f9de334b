//! # Orchestrator Binding
//!
//! Adapts the CloudFormation custom resource contract to the lifecycle handler:
//! parse the trigger event, gate on dependency readiness, enforce the access
//! scope, run, and report. [`LambdaRuntime`] drives the [`Invoker`] from the
//! Lambda runtime API.

pub mod event;
pub mod invoker;
pub mod runtime;
pub mod scope;

pub use event::CustomResourceEvent;
pub use invoker::{DependencyReadiness, Invoker};
pub use runtime::{LambdaRuntime, NextInvocation};
pub use scope::{AccessScope, ScopedSecretResolver};
