//! # Initializer Configuration System
//!
//! Layered configuration for the resource initializer. Values come from, in order of
//! increasing precedence:
//!
//! 1. Built-in defaults ([`InitializerConfig::default`])
//! 2. `config/initializer.yaml`
//! 3. `config/initializer.<environment>.yaml`
//! 4. `INITIALIZER__<SECTION>__<KEY>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use resource_initializer::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let timeout = manager.config().handler.timeout();
//! let attempts = manager.config().retry.max_attempts;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/initializer.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InitializerConfig {
    /// Lifecycle handler deadlines
    pub handler: HandlerConfig,

    /// Connectivity retry budget for the task runner
    pub retry: RetryConfig,

    /// Callback delivery settings
    pub callback: CallbackConfig,

    /// Secret store access
    pub secrets: SecretsConfig,

    /// Target database connection settings
    pub database: DatabaseConfig,

    /// Deploy-time grant of secrets and targets the task may touch
    pub scope: ScopeConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Hard wall-clock limit for one initialization
    pub timeout_ms: u64,

    /// Time kept back from the invocation deadline for delivering the callback
    pub reporting_reserve_ms: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 90_000,
            reporting_reserve_ms: 10_000,
        }
    }
}

impl HandlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reporting_reserve(&self) -> Duration {
        Duration::from_millis(self.reporting_reserve_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Per-request timeout for the response PUT
    pub timeout_ms: u64,

    /// Delivery attempts before the report is declared failed
    pub max_retries: u32,

    /// Pause between delivery attempts
    pub retry_delay_ms: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretProvider {
    /// AWS Parameters and Secrets Lambda extension on localhost
    #[default]
    Extension,
    /// `INITIALIZER_SECRET_<NAME>` environment variables, for local runs
    Env,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub provider: SecretProvider,
    pub extension_port: u16,
    pub timeout_ms: u64,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: SecretProvider::Extension,
            extension_port: 2773,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Limit for a single connection attempt
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Empty lists grant everything; deployments are expected to fill both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub allowed_secrets: Vec<String>,

    /// `host:port` or bare `host` entries
    pub allowed_targets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl InitializerConfig {
    /// Reject settings that would make the handler or reporter misbehave
    pub fn validate(&self) -> ConfigResult<()> {
        if self.handler.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "handler.timeout_ms",
                "0",
                "timeout must be greater than 0",
            ));
        }

        if self.handler.reporting_reserve_ms >= self.handler.timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "handler.reporting_reserve_ms",
                self.handler.reporting_reserve_ms.to_string(),
                "reserve must be smaller than handler.timeout_ms",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.retry.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.multiplier",
                self.retry.multiplier.to_string(),
                "multiplier must be at least 1.0",
            ));
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.retry.max_delay_ms.to_string(),
                "max delay must not be below retry.base_delay_ms",
            ));
        }

        if self.callback.max_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "callback.max_retries",
                "0",
                "at least one delivery attempt is required",
            ));
        }

        if self.callback.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "callback.timeout_ms",
                "0",
                "timeout must be greater than 0",
            ));
        }

        if self.database.connect_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.connect_timeout_ms",
                "0",
                "timeout must be greater than 0",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "logging.level",
                "logging configuration",
            ));
        }

        Ok(())
    }
}
