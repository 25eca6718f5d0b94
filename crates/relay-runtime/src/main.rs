use anyhow::{Context, Result};
use clap::Parser;
use relay_monitoring::{LogExt, MonitoringConfig};
use relay_runtime::{Cli, RuntimeConfig};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().into_command();

    // Set up logging
    let monitoring_config = MonitoringConfig::from_env("relay");
    relay_monitoring::init_logging(&monitoring_config).context("Failed to initialize logging")?;

    let outcome = execute(command).await;
    relay_monitoring::shutdown(&monitoring_config);

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(command: relay_runtime::Command) -> Result<Value> {
    // Load configuration from environment variables
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    let engine = relay_runtime::build_engine(&config).context("Failed to build engine")?;

    let facades = if command.needs_modules() {
        relay_runtime::activate_modules(&engine, &config).await
    } else {
        Vec::new()
    };

    let outcome = relay_runtime::run(&engine, command)
        .await
        .log_err("Command failed");

    for facade in facades {
        facade.deactivate();
    }

    outcome.context("Command failed")
}
