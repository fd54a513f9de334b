//! # Connectivity Retry
//!
//! Bounded exponential backoff applied only to [`TaskError::Connectivity`]. A
//! database that is still finishing its own startup refuses connections for a
//! while; anything else the target says is final.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{TaskError, TaskResult, TaskRunner};
use crate::config::RetryConfig;
use crate::models::{Credential, TaskConfig, TaskPayload};

/// Attempt budget and delay schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A single attempt, no retry
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.multiplier.powi(exponent)).min(max_ms);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Run `operation` until it succeeds, fails with a non-connectivity error, or the
/// attempt budget is spent. The closure receives the 1-based attempt number.
pub async fn with_connectivity_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
) -> TaskResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = TaskResult<T>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = %operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(TaskError::Connectivity(reason)) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Target unreachable, will retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(TaskError::Connectivity(reason)) => {
                return Err(TaskError::Connectivity(format!(
                    "{reason} (gave up after {attempt} attempts)"
                )));
            }
            Err(other) => return Err(other),
        }
    }
}

/// Applies the connectivity retry budget around another runner
pub struct RetryingRunner<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: TaskRunner> RetryingRunner<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: TaskRunner> TaskRunner for RetryingRunner<R> {
    async fn run(&self, config: &TaskConfig, credential: &Credential) -> TaskResult<TaskPayload> {
        with_connectivity_retry(&self.policy, self.inner.runner_name(), |_| {
            self.inner.run(config, credential)
        })
        .await
    }

    fn runner_name(&self) -> &'static str {
        self.inner.runner_name()
    }
}
