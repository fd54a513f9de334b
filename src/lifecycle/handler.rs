//! # Lifecycle Handler
//!
//! Decides what a lifecycle event means for the initialization task and turns
//! whatever happens into exactly one [`InitializationResult`].
//!
//! | Event  | Behavior                                                     |
//! |--------|--------------------------------------------------------------|
//! | Create | resolve secret, run task once, Success/Failed                |
//! | Update | same as Create; the task decides whether re-running is a no-op |
//! | Delete | Success immediately, task and secret store untouched         |
//!
//! The task runs on its own tokio task so the wall-clock deadline holds even if
//! the runner blocks. When the deadline passes first, the runner task is aborted
//! and the result is `Failed` with kind `Timeout`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::InitializerConfig;
use crate::credentials::SecretResolver;
use crate::error::{ErrorKind, InitializerError};
use crate::logging::log_lifecycle_operation;
use crate::models::{InitializationRequest, InitializationResult, TaskPayload};
use crate::task_runner::{TaskResult, TaskRunner};

/// Aborts the runner task if the handler future is dropped mid-flight
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct LifecycleHandler {
    runner: Arc<dyn TaskRunner>,
    secrets: Arc<dyn SecretResolver>,
    timeout: Duration,
}

impl LifecycleHandler {
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        secrets: Arc<dyn SecretResolver>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            secrets,
            timeout,
        }
    }

    pub fn from_config(
        config: &InitializerConfig,
        runner: Arc<dyn TaskRunner>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        Self::new(runner, secrets, config.handler.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle a request under the configured timeout
    pub async fn handle(&self, request: &InitializationRequest) -> InitializationResult {
        self.handle_within(request, None).await
    }

    /// Handle a request under the configured timeout, shortened to `budget` when
    /// the caller has less time left than that
    #[instrument(skip_all, fields(token = %request.token, request_type = %request.event))]
    pub async fn handle_within(
        &self,
        request: &InitializationRequest,
        budget: Option<Duration>,
    ) -> InitializationResult {
        if !request.event.runs_task() {
            log_lifecycle_operation(
                "skip_task",
                request.token.as_str(),
                request.event.as_str(),
                "success",
                Some("delete leaves initialization side effects to the resource's own teardown"),
            );
            return InitializationResult::success(TaskPayload::new());
        }

        let limit = budget.map_or(self.timeout, |b| b.min(self.timeout));
        let started = Instant::now();
        let deadline = started + limit;

        debug!(timeout_ms = limit.as_millis() as u64, "Running initialization task");

        let result = match self.run_until(request, deadline).await {
            Ok(payload) => InitializationResult::success(payload),
            Err(e) => InitializationResult::from(e),
        };

        let elapsed = started.elapsed();
        let status = if result.is_success() { "success" } else { "failed" };
        log_lifecycle_operation(
            "run_task",
            request.token.as_str(),
            request.event.as_str(),
            status,
            result.error.as_deref(),
        );
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            success = result.is_success(),
            error_kind = ?result.error_kind,
            "Initialization finished"
        );

        result
    }

    async fn run_until(
        &self,
        request: &InitializationRequest,
        deadline: Instant,
    ) -> Result<TaskPayload, InitializerError> {
        let limit = deadline.saturating_duration_since(Instant::now());
        let timed_out = || InitializerError::Timeout {
            operation: "initialization".to_string(),
            timeout: limit,
        };

        let credential = timeout_at(deadline, self.secrets.resolve(&request.credential))
            .await
            .map_err(|_| timed_out())??;

        let runner = Arc::clone(&self.runner);
        let config = request.config.clone();
        let mut task = tokio::spawn(async move { runner.run(&config, &credential).await });
        let _guard = AbortOnDrop(task.abort_handle());

        match timeout_at(deadline, &mut task).await {
            Ok(joined) => Self::flatten(joined),
            Err(_) => {
                task.abort();
                warn!(
                    runner = self.runner.runner_name(),
                    "Initialization exceeded its deadline, abandoning runner"
                );
                Err(timed_out())
            }
        }
    }

    fn flatten(
        joined: Result<TaskResult<TaskPayload>, JoinError>,
    ) -> Result<TaskPayload, InitializerError> {
        match joined {
            Ok(outcome) => outcome.map_err(InitializerError::from),
            Err(e) if e.is_panic() => {
                error!("Task runner panicked");
                Err(InitializerError::Execution("task runner panicked".to_string()))
            }
            Err(_) => Err(InitializerError::Execution(
                "task runner was cancelled".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for LifecycleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHandler")
            .field("runner", &self.runner.runner_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Kind reported when the handler had no time at all to run
pub(crate) fn exhausted_budget_result() -> InitializationResult {
    InitializationResult::failed(
        ErrorKind::Timeout,
        "timeout: no time left in the invocation to run initialization",
    )
}
