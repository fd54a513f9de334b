//! # SQL Initialization Runner
//!
//! Applies an [`InitScript`] to a MySQL database reached with the resolved
//! credential. One connection per run, acquired with the connectivity retry
//! budget and released on every exit path.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::retry::{with_connectivity_retry, RetryPolicy};
use super::script::{is_insert, InitScript};
use super::{TaskError, TaskResult, TaskRunner};
use crate::config::InitializerConfig;
use crate::constants::{payload, task_config, DEFAULT_MYSQL_PORT};
use crate::models::{Credential, TaskConfig, TaskPayload};

/// Connection coordinates derived from the secret and the task configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
}

impl Endpoint {
    /// Host and port always come from the secret so the access scope that vetted
    /// the secret also covers the target; only the schema may be overridden.
    pub fn resolve(config: &TaskConfig, credential: &Credential) -> TaskResult<Self> {
        let host = credential
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                TaskError::Configuration("secret does not name a database host".to_string())
            })?;

        let database = config
            .get(task_config::DATABASE)
            .cloned()
            .or_else(|| credential.dbname.clone())
            .filter(|d| !d.is_empty());

        Ok(Self {
            host,
            port: credential.port.unwrap_or(DEFAULT_MYSQL_PORT),
            database,
        })
    }

    fn connect_options(&self, credential: &Credential) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&credential.username)
            .password(&credential.password);

        match &self.database {
            Some(database) => options.database(database),
            None => options,
        }
    }
}

pub struct SqlInitializationRunner {
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl SqlInitializationRunner {
    pub fn new(connect_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            connect_timeout,
            retry,
        }
    }

    pub fn from_config(config: &InitializerConfig) -> Self {
        Self::new(
            config.database.connect_timeout(),
            RetryPolicy::from_config(&config.retry),
        )
    }

    async fn connect(&self, options: &MySqlConnectOptions) -> TaskResult<MySqlConnection> {
        match tokio::time::timeout(self.connect_timeout, MySqlConnection::connect_with(options))
            .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(classify_sqlx_error(&e)),
            Err(_) => Err(TaskError::Connectivity(format!(
                "connection attempt exceeded {:?}",
                self.connect_timeout
            ))),
        }
    }

    async fn apply(conn: &mut MySqlConnection, script: &InitScript) -> TaskResult<TaskPayload> {
        let mut rows_inserted: u64 = 0;

        for (index, statement) in script.statements().iter().enumerate() {
            let outcome = conn
                .execute(sqlx::raw_sql(statement))
                .await
                .map_err(|e| match classify_sqlx_error(&e) {
                    TaskError::Execution(msg) => TaskError::Execution(format!(
                        "statement {} of {} failed after {} applied: {msg}",
                        index + 1,
                        script.len(),
                        index
                    )),
                    other => other,
                })?;

            if is_insert(statement) {
                rows_inserted += outcome.rows_affected();
            }
            debug!(
                statement = index + 1,
                rows_affected = outcome.rows_affected(),
                "Applied initialization statement"
            );
        }

        let mut payload = TaskPayload::new();
        payload.insert(payload::ROWS_INSERTED.to_string(), rows_inserted.to_string());
        payload.insert(
            payload::STATEMENTS_APPLIED.to_string(),
            script.len().to_string(),
        );
        Ok(payload)
    }
}

#[async_trait]
impl TaskRunner for SqlInitializationRunner {
    #[instrument(skip_all, fields(runner = "sql"))]
    async fn run(&self, config: &TaskConfig, credential: &Credential) -> TaskResult<TaskPayload> {
        let script = InitScript::from_config(config)?;
        let endpoint = Endpoint::resolve(config, credential)?;
        let options = endpoint.connect_options(credential);
        let started = Instant::now();

        let mut conn = with_connectivity_retry(&self.retry, "mysql_connect", |_| {
            self.connect(&options)
        })
        .await?;

        info!(
            host = %endpoint.host,
            port = endpoint.port,
            database = endpoint.database.as_deref().unwrap_or(""),
            statements = script.len(),
            "Connected to target, applying initialization script"
        );

        // On error or cancellation the connection is dropped, which closes the socket.
        let outcome = Self::apply(&mut conn, &script).await;

        if outcome.is_ok() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Graceful close failed after successful initialization");
            }
        }

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "SQL runner finished");
        outcome
    }

    fn runner_name(&self) -> &'static str {
        "sql_initialization"
    }
}

/// Unreachable targets are connectivity failures; rejections are execution failures
pub fn classify_sqlx_error(error: &sqlx::Error) -> TaskError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => TaskError::Connectivity(error.to_string()),
        sqlx::Error::Database(db) => {
            // SQLSTATE class 08 is "connection exception"
            let code = db.code();
            if code.as_deref().is_some_and(|c| c.starts_with("08")) {
                TaskError::Connectivity(db.message().to_string())
            } else {
                TaskError::Execution(match code {
                    Some(code) => format!("{} (SQLSTATE {code})", db.message()),
                    None => db.message().to_string(),
                })
            }
        }
        sqlx::Error::Configuration(e) => TaskError::Configuration(e.to_string()),
        other => TaskError::Execution(other.to_string()),
    }
}
