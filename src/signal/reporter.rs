//! # Signal Reporter
//!
//! Delivers the single outcome of an initialization to the callback target.
//! The control plane treats the first response it receives as final, so every
//! correlation token is reported at most once per process. A token is reserved in
//! the ledger before any I/O; a second report for it is refused without touching
//! the network. The reservation is released only if delivery ultimately fails,
//! which leaves room for a caller to try again with a fresh reporter call.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::response::CallbackResponse;
use super::transport::{CallbackTransport, TransportFailure};
use crate::config::CallbackConfig;
use crate::error::{InitializerError, InitializerResult};
use crate::logging::log_error;
use crate::models::{CallbackTarget, CorrelationToken, InitializationResult};

/// Proof that the control plane accepted the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAck {
    pub token: CorrelationToken,
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerState {
    InFlight,
    Delivered,
}

pub struct SignalReporter {
    transport: Arc<dyn CallbackTransport>,
    /// One entry per delivered token, never evicted. Grows with the
    /// invocations a warm container serves before it is recycled.
    ledger: DashMap<String, LedgerState>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl SignalReporter {
    pub fn new(transport: Arc<dyn CallbackTransport>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            transport,
            ledger: DashMap::new(),
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(config: &CallbackConfig, transport: Arc<dyn CallbackTransport>) -> Self {
        Self::new(
            transport,
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Whether a response for `token` has been accepted by the control plane
    pub fn is_delivered(&self, token: &CorrelationToken) -> bool {
        self.ledger
            .get(token.as_str())
            .is_some_and(|state| *state == LedgerState::Delivered)
    }

    /// Report `result` to `target` exactly once for `token`
    #[instrument(skip_all, fields(token = %token, status = ?result.status))]
    pub async fn report(
        &self,
        token: &CorrelationToken,
        target: &CallbackTarget,
        result: &InitializationResult,
        log_stream: Option<&str>,
    ) -> InitializerResult<DeliveryAck> {
        self.reserve(token)?;

        match self.deliver(token, target, result, log_stream).await {
            Ok(ack) => {
                self.ledger
                    .insert(token.as_str().to_string(), LedgerState::Delivered);
                info!(
                    attempts = ack.attempts,
                    transport = self.transport.transport_name(),
                    "Initialization result delivered"
                );
                Ok(ack)
            }
            Err(e) => {
                self.ledger.remove(token.as_str());
                log_error(
                    "signal_reporter",
                    "report",
                    &e.to_string(),
                    Some(token.as_str()),
                );
                Err(e)
            }
        }
    }

    fn reserve(&self, token: &CorrelationToken) -> InitializerResult<()> {
        match self.ledger.entry(token.as_str().to_string()) {
            Entry::Occupied(entry) => {
                warn!(state = ?*entry.get(), "Refusing second report for token");
                Err(InitializerError::AlreadyReported {
                    token: token.as_str().to_string(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(LedgerState::InFlight);
                Ok(())
            }
        }
    }

    async fn deliver(
        &self,
        token: &CorrelationToken,
        target: &CallbackTarget,
        result: &InitializationResult,
        log_stream: Option<&str>,
    ) -> InitializerResult<DeliveryAck> {
        let body = CallbackResponse::from_result(token, target, result, log_stream).to_body()?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(attempt = attempts, bytes = body.len(), "Delivering callback response");

            let failure: TransportFailure =
                match self.transport.deliver(&target.response_url, body.clone()).await {
                    Ok(()) => {
                        return Ok(DeliveryAck {
                            token: token.clone(),
                            attempts,
                            delivered_at: Utc::now(),
                        })
                    }
                    Err(failure) => failure,
                };

            if !failure.retryable {
                return Err(InitializerError::reporting_failure(
                    token.as_str(),
                    format!("{} (not retried)", failure.reason),
                ));
            }

            if attempts >= self.max_attempts {
                return Err(InitializerError::reporting_failure(
                    token.as_str(),
                    format!("{} (gave up after {attempts} attempts)", failure.reason),
                ));
            }

            warn!(
                attempt = attempts,
                max_attempts = self.max_attempts,
                reason = %failure.reason,
                "Callback delivery failed, will retry"
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

impl std::fmt::Debug for SignalReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalReporter")
            .field("transport", &self.transport.transport_name())
            .field("tracked_tokens", &self.ledger.len())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::TaskPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given failure for the first `failures` calls
    struct FlakyTransport {
        calls: AtomicU32,
        failures: u32,
        failure: TransportFailure,
    }

    #[async_trait]
    impl CallbackTransport for FlakyTransport {
        async fn deliver(&self, _url: &str, _body: Vec<u8>) -> Result<(), TransportFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.failure.clone())
            } else {
                Ok(())
            }
        }
    }

    fn flaky(failures: u32, failure: TransportFailure) -> Arc<FlakyTransport> {
        Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures,
            failure,
        })
    }

    fn target() -> CallbackTarget {
        CallbackTarget {
            response_url: "http://localhost/cb".into(),
            stack_id: "stack".into(),
            logical_resource_id: "MyRdsInit".into(),
            physical_resource_id: "MyRdsInit-1".into(),
        }
    }

    #[tokio::test]
    async fn test_retry_then_deliver() {
        let transport = flaky(2, TransportFailure::retryable("HTTP 503"));
        let reporter = SignalReporter::new(transport.clone(), 3, Duration::from_millis(1));
        let token = CorrelationToken::new("t1");

        let ack = reporter
            .report(&token, &target(), &InitializationResult::success(TaskPayload::new()), None)
            .await
            .unwrap();

        assert_eq!(ack.attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(reporter.is_delivered(&token));
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried_and_releases_token() {
        let transport = flaky(1, TransportFailure::terminal("HTTP 403"));
        let reporter = SignalReporter::new(transport.clone(), 5, Duration::from_millis(1));
        let token = CorrelationToken::new("t2");
        let result = InitializationResult::success(TaskPayload::new());

        let err = reporter.report(&token, &target(), &result, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReportingFailure);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!reporter.is_delivered(&token));

        // Released, so a later report may go out
        reporter.report(&token, &target(), &result, None).await.unwrap();
        assert!(reporter.is_delivered(&token));
    }

    #[tokio::test]
    async fn test_second_report_refused_without_io() {
        let transport = flaky(0, TransportFailure::terminal("unused"));
        let reporter = SignalReporter::new(transport.clone(), 3, Duration::from_millis(1));
        let token = CorrelationToken::new("t3");
        let result = InitializationResult::success(TaskPayload::new());

        reporter.report(&token, &target(), &result, None).await.unwrap();
        let err = reporter.report(&token, &target(), &result, None).await.unwrap_err();

        assert!(matches!(err, InitializerError::AlreadyReported { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let transport = flaky(10, TransportFailure::retryable("network error"));
        let reporter = SignalReporter::new(transport.clone(), 2, Duration::from_millis(1));

        let err = reporter
            .report(
                &CorrelationToken::new("t4"),
                &target(),
                &InitializationResult::success(TaskPayload::new()),
                None,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("gave up after 2 attempts"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ledger_tracks_only_delivered_tokens() {
        let transport = flaky(1, TransportFailure::terminal("HTTP 403"));
        let reporter = SignalReporter::new(transport, 1, Duration::from_millis(1));
        let result = InitializationResult::success(TaskPayload::new());

        let _ = reporter
            .report(&CorrelationToken::new("lost"), &target(), &result, None)
            .await;
        for token in ["c1", "u1", "d1"] {
            reporter
                .report(&CorrelationToken::new(token), &target(), &result, None)
                .await
                .unwrap();
        }

        assert_eq!(reporter.ledger.len(), 3);
        assert!(!reporter.ledger.contains_key("lost"));
    }
}
