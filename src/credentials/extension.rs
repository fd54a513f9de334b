//! Secrets read through the AWS Parameters and Secrets Lambda extension.
//!
//! The extension listens on localhost, authenticates callers by the function's
//! session token, and fronts Secrets Manager with the function's own IAM grant,
//! so the initializer never handles long-lived AWS keys.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use super::SecretResolver;
use crate::config::SecretsConfig;
use crate::constants::env::{EXTENSION_PORT, SESSION_TOKEN};
use crate::error::{InitializerError, InitializerResult};
use crate::models::{Credential, CredentialLocator};

const TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
}

#[derive(Clone)]
pub struct SecretsExtensionResolver {
    client: Client,
    base_url: Url,
    session_token: String,
}

impl std::fmt::Debug for SecretsExtensionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsExtensionResolver")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl SecretsExtensionResolver {
    pub fn new(
        base_url: &str,
        session_token: impl Into<String>,
        timeout: Duration,
    ) -> InitializerResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            InitializerError::Credential(format!("invalid secrets extension URL: {e}"))
        })?;

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            InitializerError::Credential(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url,
            session_token: session_token.into(),
        })
    }

    /// Port from `PARAMETERS_SECRETS_EXTENSION_HTTP_PORT` when set, token from
    /// `AWS_SESSION_TOKEN`
    pub fn from_config(config: &SecretsConfig) -> InitializerResult<Self> {
        let port = std::env::var(EXTENSION_PORT)
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(config.extension_port);

        let session_token = std::env::var(SESSION_TOKEN).map_err(|_| {
            InitializerError::Credential(format!(
                "{SESSION_TOKEN} is not set; the secrets extension requires it"
            ))
        })?;

        Self::new(
            &format!("http://localhost:{port}"),
            session_token,
            Duration::from_millis(config.timeout_ms),
        )
    }
}

#[async_trait]
impl SecretResolver for SecretsExtensionResolver {
    async fn resolve(&self, locator: &CredentialLocator) -> InitializerResult<Credential> {
        let mut url = self.base_url.join("/secretsmanager/get").map_err(|e| {
            InitializerError::Credential(format!("failed to construct URL: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("secretId", locator.as_str());

        debug!(secret = %locator, "Resolving secret through extension");

        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.session_token)
            .send()
            .await
            .map_err(|e| {
                error!(secret = %locator, error = %e, "Secrets extension unreachable");
                InitializerError::Credential(format!("secrets extension unreachable: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InitializerError::Credential(format!(
                "secret '{locator}' lookup failed with HTTP {status}: {}",
                body.trim()
            )));
        }

        let document: GetSecretValueResponse = response.json().await.map_err(|e| {
            InitializerError::Credential(format!("unexpected secrets extension response: {e}"))
        })?;

        let secret_string = document.secret_string.ok_or_else(|| {
            InitializerError::Credential(format!("secret '{locator}' has no SecretString"))
        })?;

        Credential::from_secret_string(&secret_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_resolves_secret_with_session_token() {
        let mut server = Server::new_async().await;
        let secret = serde_json::json!({
            "username": "admin",
            "password": "pw",
            "host": "db.internal",
            "port": 3306
        })
        .to_string();
        let mock = server
            .mock("GET", "/secretsmanager/get")
            .match_query(Matcher::UrlEncoded("secretId".into(), "BlogDbSecret".into()))
            .match_header(TOKEN_HEADER, "session-token")
            .with_status(200)
            .with_body(
                serde_json::json!({ "Name": "BlogDbSecret", "SecretString": secret }).to_string(),
            )
            .create_async()
            .await;

        let resolver =
            SecretsExtensionResolver::new(&server.url(), "session-token", Duration::from_secs(2))
                .unwrap();
        let credential = resolver
            .resolve(&CredentialLocator::new("BlogDbSecret"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(credential.username, "admin");
        assert_eq!(credential.host.as_deref(), Some("db.internal"));
    }

    #[tokio::test]
    async fn test_http_error_is_credential_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/secretsmanager/get")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("ResourceNotFoundException")
            .create_async()
            .await;

        let resolver =
            SecretsExtensionResolver::new(&server.url(), "token", Duration::from_secs(2)).unwrap();
        let err = resolver
            .resolve(&CredentialLocator::new("missing"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Credential);
        assert!(err.to_string().contains("HTTP 400"));
    }
}
