//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, environment
//! detection, and layering of environment-variable overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::InitializerConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "initializer.yaml";
const ENV_PREFIX: &str = "INITIALIZER";

/// Loaded configuration plus the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: InitializerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            handler_timeout_ms = config.handler.timeout_ms,
            retry_attempts = config.retry.max_attempts,
            secret_provider = ?config.secrets.provider,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: InitializerConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    fn build(config_directory: &Path, environment: &str) -> ConfigResult<InitializerConfig> {
        let defaults = Config::try_from(&InitializerConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(config_directory.join(BASE_FILE))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(config_directory.join(format!("initializer.{environment}.yaml")))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scope.allowed_secrets")
                    .with_list_parse_key("scope.allowed_targets"),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        Ok(settings.try_deserialize::<InitializerConfig>()?)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &InitializerConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: INITIALIZER_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("INITIALIZER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `INITIALIZER_CONFIG_DIR`, then `./config`, then the Lambda task root
    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var("INITIALIZER_CONFIG_DIR") {
            return PathBuf::from(dir);
        }

        let local = PathBuf::from("config");
        if local.is_dir() {
            return local;
        }

        env::var("LAMBDA_TASK_ROOT")
            .map(|root| PathBuf::from(root).join("config"))
            .unwrap_or(local)
    }
}
