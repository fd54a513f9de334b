//! # System Constants
//!
//! Wire names, configuration keys and environment variables shared across the
//! binding, the task runner and the reporter.

/// Keys read from the task configuration bag
pub mod task_config {
    /// Opaque `;`-separated SQL applied verbatim
    pub const STATEMENTS: &str = "statements";
    /// Dimension table created when no statements are supplied
    pub const TABLE: &str = "table";
    /// Table seeded when neither `statements` nor `table` is given; the
    /// federated weather query joins on its `key` column
    pub const DEFAULT_TABLE: &str = "master_dimension";
    /// `key=Name,key=Name` seed rows for the dimension table
    pub const SEED_ROWS: &str = "seed_rows";
    /// Database name overriding the secret's `dbname`
    pub const DATABASE: &str = "database";
}

/// Keys written to the task payload
pub mod payload {
    pub const ROWS_INSERTED: &str = "rowsInserted";
    pub const STATEMENTS_APPLIED: &str = "statementsApplied";
}

/// Custom resource property names
pub mod properties {
    pub const CREDS_SECRET_NAME: &str = "credsSecretName";
    pub const CONFIG: &str = "config";
    pub const SERVICE_TOKEN: &str = "ServiceToken";
}

/// Environment variables consulted at runtime
pub mod env {
    pub const LAMBDA_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
    pub const LAMBDA_LOG_STREAM: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
    pub const SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
    pub const EXTENSION_PORT: &str = "PARAMETERS_SECRETS_EXTENSION_HTTP_PORT";
    pub const SECRET_PREFIX: &str = "INITIALIZER_SECRET_";
}

/// Control plane limit on the serialized callback document
pub const MAX_RESPONSE_BYTES: usize = 4096;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
