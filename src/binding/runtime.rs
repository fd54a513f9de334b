//! Lambda custom runtime loop.
//!
//! Polls `/2018-06-01/runtime/invocation/next`, hands each event to the
//! [`Invoker`], and posts the outcome back to the runtime API. Invocations are
//! handled one at a time.

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::invoker::{DependencyReadiness, Invoker};
use crate::constants::env::LAMBDA_RUNTIME_API;
use crate::error::{InitializerError, InitializerResult};
use crate::signal::DeliveryAck;

const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";

/// One event handed out by the runtime API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextInvocation {
    pub request_id: String,
    /// Milliseconds since the epoch at which the function is killed
    pub deadline_ms: Option<i64>,
    pub body: Vec<u8>,
}

impl NextInvocation {
    /// Time left before the deadline, measured now
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline_ms.map(|deadline| {
            let left = deadline - Utc::now().timestamp_millis();
            Duration::from_millis(left.max(0) as u64)
        })
    }
}

pub struct LambdaRuntime {
    client: Client,
    endpoint: String,
    invoker: Invoker,
}

impl LambdaRuntime {
    /// `endpoint` is the runtime API base, e.g. `http://127.0.0.1:9001`
    pub fn new(endpoint: impl Into<String>, invoker: Invoker) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            // No client timeout: `next` long-polls until an event arrives
            client: Client::new(),
            endpoint,
            invoker,
        }
    }

    pub fn from_env(invoker: Invoker) -> InitializerResult<Self> {
        let api = std::env::var(LAMBDA_RUNTIME_API).map_err(|_| {
            InitializerError::Runtime(format!("{LAMBDA_RUNTIME_API} is not set"))
        })?;
        Ok(Self::new(format!("http://{api}"), invoker))
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{API_VERSION}/runtime/{path}", self.endpoint)
    }

    /// Serve invocations until the runtime API fails
    pub async fn run(&self) -> InitializerResult<()> {
        info!(endpoint = %self.endpoint, "Lambda runtime loop started");
        loop {
            self.handle_next().await?;
        }
    }

    /// Fetch, handle and acknowledge a single invocation
    pub async fn handle_next(&self) -> InitializerResult<()> {
        let invocation = self.next_invocation().await?;
        let remaining = invocation.remaining();
        debug!(
            request_id = %invocation.request_id,
            remaining_ms = remaining.map(|r| r.as_millis() as u64),
            "Received invocation"
        );

        match self
            .invoker
            .invoke_raw(&invocation.body, &DependencyReadiness::Ready, remaining)
            .await
        {
            Ok(ack) => self.send_response(&invocation.request_id, &ack).await,
            Err(e) => {
                error!(request_id = %invocation.request_id, error = %e, "Invocation failed");
                self.send_error(&invocation.request_id, &e).await
            }
        }
    }

    pub async fn next_invocation(&self) -> InitializerResult<NextInvocation> {
        let response = self
            .client
            .get(self.url("invocation/next"))
            .send()
            .await
            .map_err(|e| InitializerError::Runtime(format!("failed to fetch next invocation: {e}")))?;

        if !response.status().is_success() {
            return Err(InitializerError::Runtime(format!(
                "runtime API returned HTTP {} for next invocation",
                response.status()
            )));
        }

        let headers = response.headers();
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                InitializerError::Runtime(format!("next invocation has no {REQUEST_ID_HEADER}"))
            })?;
        let deadline_ms = headers
            .get(DEADLINE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());
        if deadline_ms.is_none() {
            warn!(request_id = %request_id, "Invocation carries no deadline");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| InitializerError::Runtime(format!("failed to read invocation body: {e}")))?
            .to_vec();

        Ok(NextInvocation {
            request_id,
            deadline_ms,
            body,
        })
    }

    pub async fn send_response(&self, request_id: &str, ack: &DeliveryAck) -> InitializerResult<()> {
        let body = json!({
            "RequestId": ack.token.as_str(),
            "Attempts": ack.attempts,
            "DeliveredAt": ack.delivered_at.to_rfc3339(),
        });
        self.post(&format!("invocation/{request_id}/response"), body).await
    }

    pub async fn send_error(&self, request_id: &str, error: &InitializerError) -> InitializerResult<()> {
        let body = json!({
            "errorMessage": error.to_string(),
            "errorType": format!("Initializer.{}", error.kind()),
        });
        self.post(&format!("invocation/{request_id}/error"), body).await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> InitializerResult<()> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| InitializerError::Runtime(format!("failed to post {path}: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(InitializerError::Runtime(format!(
                "runtime API returned HTTP {} for {path}",
                response.status()
            )))
        }
    }
}
