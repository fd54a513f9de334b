//! # Invoker
//!
//! One trigger event in, one report out. The invoker is the only place that
//! joins the lifecycle handler to the signal reporter, so every parseable event
//! produces exactly one report attempt regardless of how the task went.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use super::event::CustomResourceEvent;
use super::scope::{AccessScope, ScopedSecretResolver};
use crate::config::{InitializerConfig, SecretProvider};
use crate::constants::env::LAMBDA_LOG_STREAM;
use crate::credentials::{EnvSecretResolver, SecretResolver, SecretsExtensionResolver};
use crate::error::{ErrorKind, InitializerResult};
use crate::lifecycle::{exhausted_budget_result, LifecycleHandler};
use crate::logging::log_lifecycle_operation;
use crate::models::{InitializationRequest, InitializationResult};
use crate::signal::{DeliveryAck, HttpCallbackTransport, SignalReporter};
use crate::task_runner::SqlInitializationRunner;

/// Whether the resource the task depends on is usable yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DependencyReadiness {
    #[default]
    Ready,
    NotReady { reason: String },
}

impl DependencyReadiness {
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }
}

pub struct Invoker {
    handler: LifecycleHandler,
    reporter: SignalReporter,
    reporting_reserve: Duration,
    log_stream: Option<String>,
}

impl Invoker {
    pub fn new(handler: LifecycleHandler, reporter: SignalReporter, reporting_reserve: Duration) -> Self {
        Self {
            handler,
            reporter,
            reporting_reserve,
            log_stream: None,
        }
    }

    /// Named in failure reasons so operators know where to look
    pub fn with_log_stream(mut self, log_stream: Option<String>) -> Self {
        self.log_stream = log_stream;
        self
    }

    /// Production wiring: scoped secret resolver, MySQL runner, HTTP callback
    pub fn from_config(config: &InitializerConfig) -> InitializerResult<Self> {
        let provider: Arc<dyn SecretResolver> = match config.secrets.provider {
            SecretProvider::Extension => Arc::new(SecretsExtensionResolver::from_config(&config.secrets)?),
            SecretProvider::Env => Arc::new(EnvSecretResolver::new()),
        };
        let secrets = Arc::new(ScopedSecretResolver::new(
            provider,
            AccessScope::from_config(&config.scope),
        ));

        let runner = Arc::new(SqlInitializationRunner::from_config(config));
        let handler = LifecycleHandler::from_config(config, runner, secrets);

        let transport = Arc::new(HttpCallbackTransport::from_config(&config.callback)?);
        let reporter = SignalReporter::from_config(&config.callback, transport);

        Ok(Self::new(handler, reporter, config.handler.reporting_reserve())
            .with_log_stream(std::env::var(LAMBDA_LOG_STREAM).ok()))
    }

    pub fn handler(&self) -> &LifecycleHandler {
        &self.handler
    }

    pub fn reporter(&self) -> &SignalReporter {
        &self.reporter
    }

    /// Parse and invoke. An unparseable event is returned as an error, unreported.
    pub async fn invoke_raw(
        &self,
        raw: &[u8],
        readiness: &DependencyReadiness,
        remaining: Option<Duration>,
    ) -> InitializerResult<DeliveryAck> {
        let event = CustomResourceEvent::parse(raw)?;
        self.invoke(&event, readiness, remaining).await
    }

    /// Handle the event and report its result. `remaining` is the time left in
    /// the invocation; the reporting reserve is kept back from it.
    #[instrument(skip_all, fields(token = %event.request_id, request_type = %event.request_type))]
    pub async fn invoke(
        &self,
        event: &CustomResourceEvent,
        readiness: &DependencyReadiness,
        remaining: Option<Duration>,
    ) -> InitializerResult<DeliveryAck> {
        let token = event.token();
        let target = event.callback_target();

        let result = match event.to_request(target.clone()) {
            Ok(request) => self.run(&request, readiness, remaining).await,
            Err(e) => {
                log_lifecycle_operation(
                    "build_request",
                    token.as_str(),
                    event.request_type.as_str(),
                    "failed",
                    Some(e.to_string().as_str()),
                );
                InitializationResult::from(e)
            }
        };

        info!(
            physical_resource_id = %target.physical_resource_id,
            success = result.is_success(),
            "Reporting initialization result"
        );

        self.reporter
            .report(&token, &target, &result, self.log_stream.as_deref())
            .await
    }

    async fn run(
        &self,
        request: &InitializationRequest,
        readiness: &DependencyReadiness,
        remaining: Option<Duration>,
    ) -> InitializationResult {
        if !request.event.runs_task() {
            return self.handler.handle(request).await;
        }

        if let DependencyReadiness::NotReady { reason } = readiness {
            log_lifecycle_operation(
                "check_readiness",
                request.token.as_str(),
                request.event.as_str(),
                "failed",
                Some(reason.as_str()),
            );
            return InitializationResult::failed(
                ErrorKind::Precondition,
                format!("dependency not ready: {reason}"),
            );
        }

        let budget = remaining.map(|r| r.saturating_sub(self.reporting_reserve));
        if budget == Some(Duration::ZERO) {
            return exhausted_budget_result();
        }

        self.handler.handle_within(request, budget).await
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("handler", &self.handler)
            .field("reporter", &self.reporter)
            .field("reporting_reserve", &self.reporting_reserve)
            .finish()
    }
}
