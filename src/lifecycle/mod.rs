//! # Lifecycle Handling
//!
//! Maps Create/Update/Delete onto the initialization task. See [`LifecycleHandler`].

pub mod handler;

pub use handler::LifecycleHandler;
pub(crate) use handler::exhausted_budget_result;
