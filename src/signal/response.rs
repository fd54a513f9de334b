//! The custom resource response document the control plane waits for.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::MAX_RESPONSE_BYTES;
use crate::error::{InitializerError, InitializerResult};
use crate::models::{CallbackTarget, CorrelationToken, InitializationResult, OutcomeStatus, TaskPayload};

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl From<OutcomeStatus> for CallbackStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Success => CallbackStatus::Success,
            OutcomeStatus::Failed => CallbackStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackResponse {
    pub status: CallbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    /// The correlation token
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    #[serde(default, skip_serializing_if = "TaskPayload::is_empty")]
    pub data: TaskPayload,
}

impl CallbackResponse {
    pub fn from_result(
        token: &CorrelationToken,
        target: &CallbackTarget,
        result: &InitializationResult,
        log_stream: Option<&str>,
    ) -> Self {
        let reason = match result.status {
            OutcomeStatus::Success => None,
            OutcomeStatus::Failed => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "initialization failed".to_string());
                Some(match log_stream {
                    Some(stream) => format!("{message} (see log stream {stream})"),
                    None => message,
                })
            }
        };

        Self {
            status: result.status.into(),
            reason,
            physical_resource_id: target.physical_resource_id.clone(),
            stack_id: target.stack_id.clone(),
            request_id: token.as_str().to_string(),
            logical_resource_id: target.logical_resource_id.clone(),
            no_echo: false,
            data: result.payload.clone(),
        }
    }

    /// Serialize within the size limit.
    ///
    /// An oversized `Data` map is dropped and the document becomes `FAILED`.
    /// The reason is then shortened until the document fits.
    pub fn to_body(&self) -> InitializerResult<Vec<u8>> {
        let mut document = self.clone();
        loop {
            let body = serde_json::to_vec(&document)?;
            if body.len() <= MAX_RESPONSE_BYTES {
                return Ok(body);
            }

            if !document.data.is_empty() {
                warn!(
                    token = %document.request_id,
                    bytes = body.len(),
                    keys = document.data.len(),
                    "Result data does not fit the response document, reporting failure"
                );
                document.drop_oversized_data(body.len());
                continue;
            }

            let overflow = body.len() - MAX_RESPONSE_BYTES;
            match document.reason.as_mut() {
                Some(reason) if reason.len() > ELLIPSIS.len() => {
                    let keep = reason.len().saturating_sub(overflow + ELLIPSIS.len());
                    truncate_at_char_boundary(reason, keep);
                    reason.push_str(ELLIPSIS);
                }
                // Only the control plane's own identifiers remain
                _ => {
                    return Err(InitializerError::reporting_failure(
                        &document.request_id,
                        format!(
                            "response document is {} bytes, limit is {MAX_RESPONSE_BYTES}",
                            body.len()
                        ),
                    ))
                }
            }
        }
    }

    fn drop_oversized_data(&mut self, document_bytes: usize) {
        let message = format!(
            "result data exceeded the {MAX_RESPONSE_BYTES} byte response limit \
             (document was {document_bytes} bytes)"
        );
        self.reason = Some(match self.reason.take() {
            Some(previous) => format!("{message}; {previous}"),
            None => message,
        });
        self.status = CallbackStatus::Failed;
        self.data.clear();
    }
}

fn truncate_at_char_boundary(value: &mut String, max_len: usize) {
    let mut cut = max_len.min(value.len());
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    value.truncate(cut);
}
