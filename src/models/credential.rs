//! Credential material resolved from the secret store at invocation time.
//!
//! A [`Credential`] is never serialized and never logged; its `Debug` output masks
//! the password.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{InitializerError, InitializerResult};

/// Name or ARN of a secret. Never the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialLocator(String);

impl CredentialLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Username/password plus the connection coordinates a database secret carries
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub dbname: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: None,
            port: None,
            dbname: None,
            engine: None,
        }
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Parse the JSON document stored in a database secret
    pub fn from_secret_string(secret: &str) -> InitializerResult<Self> {
        // serde messages can echo field values, so only the position is kept
        let credential: Credential = serde_json::from_str(secret).map_err(|e| {
            InitializerError::Credential(format!(
                "malformed secret document ({:?} error at line {}, column {})",
                e.classify(),
                e.line(),
                e.column()
            ))
        })?;

        if credential.username.is_empty() {
            return Err(InitializerError::Credential(
                "secret document has an empty username".to_string(),
            ));
        }

        Ok(credential)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("engine", &self.engine)
            .finish()
    }
}

/// RDS writes the port as a number; hand-made secrets often use a string
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("port must fit in u16")),
        Some(Value::String(s)) => s
            .parse::<u16>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid port '{s}'"))),
        Some(_) => Err(D::Error::custom("port must be a number or string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rds_secret_document() {
        let secret = r#"{
            "username": "admin",
            "password": "s3cr3t-value",
            "engine": "mysql",
            "host": "db.example.internal",
            "port": 3306,
            "dbname": "blog_athena_join_s3_mysql",
            "dbInstanceIdentifier": "ignored"
        }"#;

        let credential = Credential::from_secret_string(secret).unwrap();
        assert_eq!(credential.username, "admin");
        assert_eq!(credential.port, Some(3306));
        assert_eq!(credential.dbname.as_deref(), Some("blog_athena_join_s3_mysql"));
    }

    #[test]
    fn test_string_port_accepted() {
        let credential =
            Credential::from_secret_string(r#"{"username":"u","password":"p","port":"3307"}"#)
                .unwrap();
        assert_eq!(credential.port, Some(3307));
    }

    #[test]
    fn test_debug_output_masks_password() {
        let credential = Credential::new("admin", "hunter2-very-secret");
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_malformed_secret_is_a_credential_error() {
        let err = Credential::from_secret_string("not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Credential);
        assert!(!err.to_string().contains("not json"));
    }
}
