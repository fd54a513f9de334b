//! # Resource Initializer
//!
//! Entry point for the Lambda custom runtime and for running one invocation
//! locally against a saved trigger event.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

use resource_initializer::binding::{DependencyReadiness, Invoker, LambdaRuntime};
use resource_initializer::config::ConfigManager;
use resource_initializer::logging::init_structured_logging;

#[derive(Parser)]
#[command(name = "resource-initializer")]
#[command(about = "Initialize a freshly provisioned database and report the outcome")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: INITIALIZER_CONFIG_DIR, ./config, $LAMBDA_TASK_ROOT/config)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve invocations from the Lambda runtime API (default)
    Runtime,

    /// Handle a single trigger event read from a file
    Invoke {
        /// Path to the custom resource event JSON
        #[arg(short, long)]
        event: PathBuf,

        /// Treat the dependency as not ready, with this reason
        #[arg(long)]
        not_ready: Option<String>,
    },

    /// Load and validate configuration, then print it
    ValidateConfig {
        /// Environment to validate (development, test, production)
        #[arg(short, long)]
        environment: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Runtime) {
        Commands::Runtime => run_runtime(cli.config_dir).await,
        Commands::Invoke { event, not_ready } => invoke_once(cli.config_dir, event, not_ready).await,
        Commands::ValidateConfig { environment } => validate_config(cli.config_dir, environment),
    };

    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "Resource initializer exited with an error");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(config_dir: Option<PathBuf>) -> Result<std::sync::Arc<ConfigManager>> {
    let manager =
        ConfigManager::load_from_directory(config_dir).context("failed to load configuration")?;
    init_structured_logging(&manager.config().logging);
    Ok(manager)
}

async fn run_runtime(config_dir: Option<PathBuf>) -> Result<()> {
    let manager = load_config(config_dir)?;
    let invoker = Invoker::from_config(manager.config()).context("failed to build invoker")?;
    let runtime = LambdaRuntime::from_env(invoker).context("not running under a Lambda runtime")?;

    info!(environment = %manager.environment(), "Starting Lambda runtime loop");
    runtime.run().await.context("runtime loop failed")?;
    Ok(())
}

async fn invoke_once(
    config_dir: Option<PathBuf>,
    event: PathBuf,
    not_ready: Option<String>,
) -> Result<()> {
    let manager = load_config(config_dir)?;
    let raw = std::fs::read(&event)
        .with_context(|| format!("failed to read event file {}", event.display()))?;

    let readiness = match not_ready {
        Some(reason) => DependencyReadiness::not_ready(reason),
        None => DependencyReadiness::Ready,
    };

    let invoker = Invoker::from_config(manager.config()).context("failed to build invoker")?;
    let ack = invoker
        .invoke_raw(&raw, &readiness, None)
        .await
        .context("invocation was not reported")?;

    println!(
        "Reported {} after {} attempt(s) at {}",
        ack.token,
        ack.attempts,
        ack.delivered_at.to_rfc3339()
    );
    Ok(())
}

fn validate_config(config_dir: Option<PathBuf>, environment: Option<String>) -> Result<()> {
    let environment = environment.unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(config_dir, &environment)
        .with_context(|| format!("configuration for '{environment}' is invalid"))?;

    println!("Environment: {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!(
        "{}",
        serde_json::to_string_pretty(manager.config()).context("failed to render configuration")?
    );
    println!("Configuration is valid");
    Ok(())
}
