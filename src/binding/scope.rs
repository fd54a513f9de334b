//! Deploy-time grant limiting which secrets and targets an invocation may use.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::config::ScopeConfig;
use crate::constants::DEFAULT_MYSQL_PORT;
use crate::credentials::SecretResolver;
use crate::error::{InitializerError, InitializerResult};
use crate::models::{Credential, CredentialLocator};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TargetGrant {
    host: String,
    port: Option<u16>,
}

impl TargetGrant {
    fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        match entry.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => Self {
                    host: host.to_ascii_lowercase(),
                    port: Some(port),
                },
                Err(_) => Self {
                    host: entry.to_ascii_lowercase(),
                    port: None,
                },
            },
            None => Self {
                host: entry.to_ascii_lowercase(),
                port: None,
            },
        }
    }

    fn permits(&self, host: &str, port: u16) -> bool {
        self.host.eq_ignore_ascii_case(host) && self.port.map_or(true, |p| p == port)
    }
}

/// Empty lists grant everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    secrets: Vec<String>,
    targets: Vec<TargetGrant>,
}

impl AccessScope {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self {
            secrets: config
                .allowed_secrets
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            targets: config
                .allowed_targets
                .iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| TargetGrant::parse(t))
                .collect(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.secrets.is_empty() && self.targets.is_empty()
    }

    pub fn check_secret(&self, locator: &CredentialLocator) -> InitializerResult<()> {
        if self.secrets.is_empty() || self.secrets.iter().any(|s| s == locator.as_str()) {
            Ok(())
        } else {
            Err(InitializerError::Credential(format!(
                "secret '{locator}' is outside the granted scope"
            )))
        }
    }

    pub fn check_target(&self, credential: &Credential) -> InitializerResult<()> {
        if self.targets.is_empty() {
            return Ok(());
        }

        let host = credential.host.as_deref().ok_or_else(|| {
            InitializerError::Credential(
                "secret names no host, cannot verify it against the granted targets".to_string(),
            )
        })?;
        let port = credential.port.unwrap_or(DEFAULT_MYSQL_PORT);

        if self.targets.iter().any(|grant| grant.permits(host, port)) {
            Ok(())
        } else {
            Err(InitializerError::Credential(format!(
                "target {host}:{port} is outside the granted scope"
            )))
        }
    }
}

/// Refuses out-of-scope locators before lookup and out-of-scope targets after
pub struct ScopedSecretResolver {
    inner: Arc<dyn SecretResolver>,
    scope: AccessScope,
}

impl ScopedSecretResolver {
    pub fn new(inner: Arc<dyn SecretResolver>, scope: AccessScope) -> Self {
        if scope.is_unrestricted() {
            warn!("Access scope grants every secret and target");
        }
        Self { inner, scope }
    }

    pub fn scope(&self) -> &AccessScope {
        &self.scope
    }
}

#[async_trait]
impl SecretResolver for ScopedSecretResolver {
    async fn resolve(&self, locator: &CredentialLocator) -> InitializerResult<Credential> {
        self.scope.check_secret(locator)?;
        let credential = self.inner.resolve(locator).await?;
        self.scope.check_target(&credential)?;
        Ok(credential)
    }
}
