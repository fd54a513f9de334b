//! # Credential Resolution
//!
//! Secrets are named in configuration and resolved at invocation time. Nothing in
//! this module caches or persists what it resolves.

pub mod env;
pub mod extension;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{InitializerError, InitializerResult};
use crate::models::{Credential, CredentialLocator};

pub use env::EnvSecretResolver;
pub use extension::SecretsExtensionResolver;

/// Resolves a named secret into credential material
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, locator: &CredentialLocator) -> InitializerResult<Credential>;
}

/// In-memory secrets, for tests and embedding
#[derive(Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<String, Credential>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, locator: impl Into<String>, credential: Credential) -> Self {
        self.secrets.insert(locator.into(), credential);
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, locator: &CredentialLocator) -> InitializerResult<Credential> {
        self.secrets.get(locator.as_str()).cloned().ok_or_else(|| {
            InitializerError::Credential(format!("secret '{locator}' not found"))
        })
    }
}
