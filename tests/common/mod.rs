//! Fakes shared by the integration tests: runners standing in for the target
//! database, a recording callback transport, and event builders.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use resource_initializer::credentials::StaticSecretResolver;
use resource_initializer::models::{Credential, TaskConfig, TaskPayload};
use resource_initializer::signal::{CallbackTransport, TransportFailure};
use resource_initializer::task_runner::{InitScript, TaskError, TaskResult, TaskRunner};

pub const SECRET_NAME: &str = "BlogDbSecret";
pub const DB_HOST: &str = "blog-db.internal";

pub fn credential() -> Credential {
    Credential::new("admin", "s3cr3t-pa55").with_endpoint(DB_HOST, 3306)
}

pub fn secrets() -> Arc<StaticSecretResolver> {
    Arc::new(StaticSecretResolver::new().with_secret(SECRET_NAME, credential()))
}

/// Returns queued outcomes in order, then `Ok(empty)` once the queue is drained
#[derive(Default)]
pub struct ScriptedRunner {
    outcomes: Mutex<Vec<TaskResult<TaskPayload>>>,
    calls: AtomicU32,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<TaskResult<TaskPayload>>) -> Self {
        let mut outcomes = outcomes;
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            calls: AtomicU32::new(0),
        }
    }

    pub fn succeeding(payload: TaskPayload) -> Self {
        Self::new(vec![Ok(payload)])
    }

    pub fn failing(error: TaskError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn run(&self, _config: &TaskConfig, _credential: &Credential) -> TaskResult<TaskPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(TaskPayload::new()))
    }
}

/// Sets its flag when dropped, so tests can see an abandoned run was torn down
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never returns, like a connection stuck on an unresponsive target
#[derive(Default)]
pub struct HangingRunner {
    pub released: Arc<AtomicBool>,
}

#[async_trait]
impl TaskRunner for HangingRunner {
    async fn run(&self, _config: &TaskConfig, _credential: &Credential) -> TaskResult<TaskPayload> {
        let _session = DropFlag(Arc::clone(&self.released));
        std::future::pending::<()>().await;
        Err(TaskError::Execution("unreachable".into()))
    }
}

/// Simulated target that understands the idempotent dimension-table script
#[derive(Default)]
pub struct InMemoryTarget {
    tables: Mutex<BTreeMap<String, BTreeSet<String>>>,
    tables_created: AtomicU32,
}

impl InMemoryTarget {
    pub fn tables_created(&self) -> u32 {
        self.tables_created.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.lock().unwrap().get(table).map(BTreeSet::len)
    }

    fn execute(&self, statement: &str) -> TaskResult<u64> {
        let mut tables = self.tables.lock().unwrap();

        if let Some(rest) = statement.strip_prefix("CREATE TABLE IF NOT EXISTS `") {
            let table = rest.split('`').next().unwrap_or_default().to_string();
            if !tables.contains_key(&table) {
                tables.insert(table, BTreeSet::new());
                self.tables_created.fetch_add(1, Ordering::SeqCst);
            }
            return Ok(0);
        }

        if let Some(rest) = statement.strip_prefix("INSERT IGNORE INTO `") {
            let table = rest.split('`').next().unwrap_or_default();
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| TaskError::Execution(format!("Table '{table}' doesn't exist")))?;
            let values = rest.split_once("VALUES ").map(|(_, v)| v).unwrap_or_default();

            let mut inserted = 0;
            for tuple in values.split("), (") {
                let key = tuple
                    .trim_start_matches('(')
                    .trim_start_matches('\'')
                    .split('\'')
                    .next()
                    .unwrap_or_default();
                if rows.insert(key.to_string()) {
                    inserted += 1;
                }
            }
            return Ok(inserted);
        }

        Err(TaskError::Execution(format!("unsupported statement: {statement}")))
    }
}

#[async_trait]
impl TaskRunner for InMemoryTarget {
    async fn run(&self, config: &TaskConfig, _credential: &Credential) -> TaskResult<TaskPayload> {
        let script = InitScript::from_config(config)?;
        let mut inserted = 0;
        for statement in script.statements() {
            inserted += self.execute(statement)?;
        }

        let mut payload = TaskPayload::new();
        payload.insert("rowsInserted".to_string(), inserted.to_string());
        payload.insert("statementsApplied".to_string(), script.len().to_string());
        Ok(payload)
    }
}

/// Records every delivery; fails the first `failures` with `failure`
#[derive(Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<(String, Vec<u8>)>>,
    failures: u32,
    failure: Option<TransportFailure>,
}

impl RecordingTransport {
    pub fn failing(failures: u32, failure: TransportFailure) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            failures,
            failure: Some(failure),
        }
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    pub fn documents(&self) -> Vec<Value> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| serde_json::from_slice(body).unwrap())
            .collect()
    }
}

#[async_trait]
impl CallbackTransport for RecordingTransport {
    async fn deliver(&self, url: &str, body: Vec<u8>) -> Result<(), TransportFailure> {
        let mut deliveries = self.deliveries.lock().unwrap();
        deliveries.push((url.to_string(), body));
        match &self.failure {
            Some(failure) if deliveries.len() as u32 <= self.failures => Err(failure.clone()),
            _ => Ok(()),
        }
    }
}

pub fn event(request_type: &str, token: &str, response_url: &str, config: Value) -> Value {
    json!({
        "RequestType": request_type,
        "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:rds-init",
        "ResponseURL": response_url,
        "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/blog/6a1b",
        "RequestId": token,
        "ResourceType": "Custom::RdsInitializer",
        "LogicalResourceId": "MyRdsInit",
        "PhysicalResourceId": "MyRdsInit-0123456789ab",
        "ResourceProperties": {
            "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:rds-init",
            "config": config
        }
    })
}

pub fn weather_config() -> Value {
    json!({ "credsSecretName": SECRET_NAME, "table": "weather_data" })
}

pub fn task_config(pairs: &[(&str, &str)]) -> TaskConfig {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub const TOLERANCE: Duration = Duration::from_millis(500);
