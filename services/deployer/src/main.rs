//! Combo Deployer
//!
//! Bootstraps a registry with the bundled handlers, builds a proxy for the
//! plan's caller and executes one batch plan:
//! - Reads configuration from the environment (`COMBO_PLAN` and limits)
//! - Seeds a ledger with the plan's genesis balances and exchanges
//! - Prints the execution report and address book as JSON

mod config;
mod deploy;
mod plan;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Combo Deployer");

    // Load configuration
    let config = config::Config::from_env()?;
    let json = std::fs::read_to_string(&config.plan)
        .with_context(|| format!("Failed to read plan {}", config.plan.display()))?;
    let plan = plan::Plan::from_json(&json)?;

    let report = plan::run(&config, &plan)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(failure) = report.failure {
        bail!("Batch aborted: {failure}");
    }
    info!(steps = report.outputs.len(), "Plan executed");
    Ok(())
}
