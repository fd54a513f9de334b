//! Secrets read from environment variables, for running outside Lambda.
//!
//! The locator `my-db/secret` is looked up as `INITIALIZER_SECRET_MY_DB_SECRET`
//! and must hold the same JSON document the secret store would return.

use async_trait::async_trait;

use super::SecretResolver;
use crate::constants::env::SECRET_PREFIX;
use crate::error::{InitializerError, InitializerResult};
use crate::models::{Credential, CredentialLocator};

#[derive(Debug, Default, Clone)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn variable_name(locator: &CredentialLocator) -> String {
        let normalized: String = locator
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{SECRET_PREFIX}{normalized}")
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, locator: &CredentialLocator) -> InitializerResult<Credential> {
        let variable = Self::variable_name(locator);
        let document = std::env::var(&variable).map_err(|_| {
            InitializerError::Credential(format!(
                "secret '{locator}' not found (expected {variable})"
            ))
        })?;
        Credential::from_secret_string(&document)
    }
}
