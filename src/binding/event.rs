//! CloudFormation custom resource events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::properties::{CONFIG, CREDS_SECRET_NAME, SERVICE_TOKEN};
use crate::error::{InitializerError, InitializerResult};
use crate::models::{
    CallbackTarget, CorrelationToken, CredentialLocator, InitializationRequest, LifecycleEvent,
    TaskConfig,
};

const SHORT_ID_LEN: usize = 12;

/// The trigger document as the control plane sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: LifecycleEvent,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
    #[serde(default)]
    pub old_resource_properties: Option<Map<String, Value>>,
}

impl CustomResourceEvent {
    /// An event that cannot be parsed has no callback target and cannot be reported
    pub fn parse(raw: &[u8]) -> InitializerResult<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| InitializerError::InvalidEvent(format!("unparseable trigger event: {e}")))
    }

    pub fn token(&self) -> CorrelationToken {
        CorrelationToken::new(self.request_id.clone())
    }

    /// Where the result goes. On Create a fresh physical id is minted, so call
    /// this once per invocation.
    pub fn callback_target(&self) -> CallbackTarget {
        let physical_resource_id = match (&self.request_type, &self.physical_resource_id) {
            (LifecycleEvent::Update | LifecycleEvent::Delete, Some(id)) if !id.is_empty() => {
                id.clone()
            }
            _ => generate_physical_id(&self.logical_resource_id),
        };

        CallbackTarget {
            response_url: self.response_url.clone(),
            stack_id: self.stack_id.clone(),
            logical_resource_id: self.logical_resource_id.clone(),
            physical_resource_id,
        }
    }

    /// Build the initialization request. Failures here are still reportable.
    pub fn to_request(&self, callback: CallbackTarget) -> InitializerResult<InitializationRequest> {
        let mut config = flatten_properties(&self.resource_properties);

        let locator = config
            .remove(CREDS_SECRET_NAME)
            .filter(|name| !name.trim().is_empty());

        let credential = match (locator, self.request_type.runs_task()) {
            (Some(name), _) => CredentialLocator::new(name),
            // Delete never resolves the secret
            (None, false) => CredentialLocator::new(String::new()),
            (None, true) => {
                return Err(InitializerError::InvalidEvent(format!(
                    "ResourceProperties.{CREDS_SECRET_NAME} is required for {}",
                    self.request_type
                )))
            }
        };

        Ok(InitializationRequest {
            event: self.request_type,
            token: self.token(),
            credential,
            config,
            callback,
        })
    }
}

fn generate_physical_id(logical_resource_id: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{logical_resource_id}-{}", &id[..SHORT_ID_LEN])
}

/// Top-level properties first, then the nested `config` object on top
fn flatten_properties(properties: &Map<String, Value>) -> TaskConfig {
    let mut bag = TaskConfig::new();

    for (key, value) in properties {
        if key == SERVICE_TOKEN {
            continue;
        }
        if key == CONFIG && value.is_object() {
            continue;
        }
        if let Some(text) = property_text(value) {
            bag.insert(key.clone(), text);
        }
    }

    if let Some(Value::Object(nested)) = properties.get(CONFIG) {
        for (key, value) in nested {
            if let Some(text) = property_text(value) {
                bag.insert(key.clone(), text);
            }
        }
    }

    bag
}

/// Control plane properties arrive as strings; anything structured is kept as JSON
fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
