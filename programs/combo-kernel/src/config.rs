//! Kernel configuration

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_ARGUMENTS, DEFAULT_MAX_BATCH_STEPS, DEFAULT_MAX_STACK_DEPTH};

/// Limits applied by a proxy to every batch it executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum number of frames the per-batch cache may hold
    pub max_stack_depth: usize,

    /// Maximum number of steps in one batch
    pub max_batch_steps: usize,

    /// Maximum number of arguments in one step payload
    pub max_arguments: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_batch_steps: DEFAULT_MAX_BATCH_STEPS,
            max_arguments: DEFAULT_MAX_ARGUMENTS,
        }
    }
}
