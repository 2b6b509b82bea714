//! Deployer configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use combo_kernel::{KernelConfig, DEFAULT_MAX_BATCH_STEPS, DEFAULT_MAX_STACK_DEPTH};

#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the JSON plan to execute
    pub plan: PathBuf,

    /// Cache capacity of every proxy
    pub max_stack_depth: usize,

    /// Maximum number of steps per batch
    pub max_batch_steps: usize,

    /// Fee charged on attached value, in basis points
    pub basis_fee_bps: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Config {
            plan: lookup("COMBO_PLAN")
                .context("COMBO_PLAN not set")?
                .into(),

            max_stack_depth: lookup("COMBO_MAX_STACK_DEPTH")
                .unwrap_or_else(|| DEFAULT_MAX_STACK_DEPTH.to_string())
                .parse()
                .context("Invalid COMBO_MAX_STACK_DEPTH")?,

            max_batch_steps: lookup("COMBO_MAX_BATCH_STEPS")
                .unwrap_or_else(|| DEFAULT_MAX_BATCH_STEPS.to_string())
                .parse()
                .context("Invalid COMBO_MAX_BATCH_STEPS")?,

            basis_fee_bps: lookup("COMBO_BASIS_FEE_BPS")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .context("Invalid COMBO_BASIS_FEE_BPS")?,
        })
    }

    /// Limits handed to every proxy built from this configuration
    pub fn kernel(&self) -> KernelConfig {
        KernelConfig {
            max_stack_depth: self.max_stack_depth,
            max_batch_steps: self.max_batch_steps,
            ..KernelConfig::default()
        }
    }
}
