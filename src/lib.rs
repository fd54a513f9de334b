#![allow(clippy::doc_markdown)] // Allow technical terms like CloudFormation, MySQL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Resource Initializer
//!
//! Runs a one-time initialization task against a freshly provisioned resource
//! (a MySQL database) as part of a declarative deployment, then reports the
//! outcome back to the deployment controller exactly once.
//!
//! ## Architecture
//!
//! ```text
//! trigger event ─▶ binding ─▶ lifecycle handler ─▶ task runner ─▶ target
//!                     │              │ (timeout)
//!                     │              ▼
//!                     └────────▶ signal reporter ─▶ callback URL
//! ```
//!
//! ## Module Organization
//!
//! - [`binding`] - Custom resource events, readiness, access scope, Lambda runtime
//! - [`lifecycle`] - Create/Update/Delete semantics under a hard deadline
//! - [`task_runner`] - The idempotent initialization unit and its retry budget
//! - [`signal`] - Response document and exactly-once delivery
//! - [`credentials`] - Secret resolution by name
//! - [`models`] - Per-invocation request and result values
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resource_initializer::binding::{DependencyReadiness, Invoker};
//! use resource_initializer::config::ConfigManager;
//!
//! # async fn example(event: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let invoker = Invoker::from_config(manager.config())?;
//! let ack = invoker.invoke_raw(event, &DependencyReadiness::Ready, None).await?;
//! println!("delivered after {} attempt(s)", ack.attempts);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod signal;
pub mod task_runner;

pub use binding::{CustomResourceEvent, DependencyReadiness, Invoker, LambdaRuntime};
pub use config::{ConfigManager, InitializerConfig};
pub use error::{ErrorKind, InitializerError, InitializerResult};
pub use lifecycle::LifecycleHandler;
pub use models::{InitializationRequest, InitializationResult, LifecycleEvent};
pub use signal::{DeliveryAck, SignalReporter};
pub use task_runner::{TaskError, TaskRunner};
