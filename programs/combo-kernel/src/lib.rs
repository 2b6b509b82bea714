//! Combo kernel: registry-gated atomic batch execution
//!
//! A caller submits a `Batch` of steps to their `Proxy`. Each step names a
//! handler by identifier; the proxy checks the identifier against the shared
//! `Registry`, invokes the handler in the caller's context and lets it pass
//! values to later steps through a per-batch `Cache`. Either every step
//! succeeds or the caller's state on the `Ledger` is left untouched.

// ================================
// Module Declarations
// ================================

pub mod batch;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fee;
pub mod handler;
pub mod ledger;
pub mod proxy;
pub mod registry;
pub mod types;
pub mod validation;

// ================================
// Public API Exports
// ================================

pub use batch::{Argument, Batch, BatchStep, Payload};
pub use cache::Cache;
pub use config::KernelConfig;
pub use errors::{BatchFailure, HandlerError, KernelError, LedgerError};
pub use fee::{FeeContext, FeeRule, FeeRuleRegistry, HoldingRule, FEE_BASE};
pub use handler::{Handler, InvocationContext, ResolvedCall};
pub use ledger::{Checkpoint, Ledger};
pub use proxy::{ExecutionResult, Proxy, StepOutput};
pub use registry::{AdminCap, HandlerInfo, ModuleRef, Registry, RegistryEvent, MAX_REGISTRY_EVENTS};
pub use types::{Address, Asset, HandlerId, StackValue, ValueKind, HANDLER_ID_LEN};

// ================================
// Capacity Constants
// ================================

/// Default maximum number of frames the per-batch cache may hold
pub const DEFAULT_MAX_STACK_DEPTH: usize = 256;

/// Default maximum number of steps in one batch
pub const DEFAULT_MAX_BATCH_STEPS: usize = 64;

/// Default maximum number of arguments in one step payload
pub const DEFAULT_MAX_ARGUMENTS: usize = 16;
