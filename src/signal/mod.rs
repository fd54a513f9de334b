//! # Signal Reporting
//!
//! Turns an [`InitializationResult`](crate::models::InitializationResult) into the
//! response document the control plane expects and delivers it once.

pub mod reporter;
pub mod response;
pub mod transport;

pub use reporter::{DeliveryAck, SignalReporter};
pub use response::{CallbackResponse, CallbackStatus};
pub use transport::{CallbackTransport, HttpCallbackTransport, TransportFailure};
