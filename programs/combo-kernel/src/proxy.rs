// Proxy: the batch execution engine
//
// One proxy exists per caller. `execute` is its only entry point and runs a
// batch as a single atomic unit against the caller's state:
//
// 1. Refuse the batch if the registry is halted, the caller is banned, or the
//    batch shape violates the proxy's limits. Nothing is touched yet.
// 2. Open a ledger checkpoint, move the attached native value from the caller
//    into the proxy's escrow account and charge the fee on it.
// 3. For every step, in submission order: resolve cache references, look the
//    handler up in the registry, invoke it with a caller-scoped context, check
//    its return values against its declared output contract and push them
//    onto the cache.
// 4. Return whatever attached value the steps left unspent to the caller and
//    commit.
//
// Any failure in 2-4 reverts the checkpoint, so the caller's state is exactly
// what it was before the call, and is reported as one `BatchFailure`. The
// proxy keeps no per-batch state of its own and stays usable afterwards.

use std::sync::Arc;

use borsh::BorshSerialize;
use tracing::{debug, info, warn};

use crate::batch::{Batch, BatchStep};
use crate::cache::Cache;
use crate::config::KernelConfig;
use crate::errors::{BatchFailure, KernelError, Result};
use crate::fee::{FeeContext, FeeRuleRegistry};
use crate::handler::{InvocationContext, ResolvedCall};
use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::types::{Address, Asset, HandlerId, StackValue, ValueKind};
use crate::validation;

// ================================
// Execution Result
// ================================

/// What one successful step produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: usize,
    pub handler: HandlerId,
    /// Values returned by the handler, in push order
    pub values: Vec<StackValue>,
    /// Borsh encoding of `values`
    pub bytes: Vec<u8>,
}

/// Aggregated outcome of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// Per-step outputs in submission order; empty when the batch failed
    pub outputs: Vec<StepOutput>,
    pub failure: Option<BatchFailure>,
    /// Fee charged on the attached value
    pub fee: u128,
    /// Unspent attached value returned to the caller
    pub refunded: u128,
}

impl ExecutionResult {
    fn succeeded(outputs: Vec<StepOutput>, fee: u128, refunded: u128) -> Self {
        Self {
            success: true,
            outputs,
            failure: None,
            fee,
            refunded,
        }
    }

    fn failed(failure: BatchFailure) -> Self {
        Self {
            success: false,
            outputs: Vec::new(),
            failure: Some(failure),
            fee: 0,
            refunded: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Per-step output payloads in submission order
    pub fn output_bytes(&self) -> Vec<&[u8]> {
        self.outputs.iter().map(|output| output.bytes.as_slice()).collect()
    }

    pub fn into_result(self) -> std::result::Result<Vec<StepOutput>, BatchFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.outputs),
        }
    }
}

struct Settlement {
    outputs: Vec<StepOutput>,
    fee: u128,
    refunded: u128,
}

// ================================
// Proxy
// ================================

pub struct Proxy {
    owner: Address,
    address: Address,
    registry: Arc<Registry>,
    fee_rules: Option<Arc<FeeRuleRegistry>>,
    config: KernelConfig,
}

impl Proxy {
    /// Build the proxy that executes batches on behalf of `owner`
    pub fn new(owner: Address, registry: Arc<Registry>, config: KernelConfig) -> Self {
        let mut seed = b"proxy:".to_vec();
        seed.extend_from_slice(&owner.to_bytes());
        Self {
            owner,
            address: Address::derive(&seed),
            registry,
            fee_rules: None,
            config,
        }
    }

    /// Charge fees on attached value according to `fee_rules`
    pub fn with_fee_rules(mut self, fee_rules: Arc<FeeRuleRegistry>) -> Self {
        self.fee_rules = Some(fee_rules);
        self
    }

    /// The caller this proxy acts for
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The proxy's own account, which escrows attached value during a batch
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Execute `batch` atomically against the owner's state on `ledger`
    pub fn execute(&self, ledger: &mut Ledger, batch: &Batch) -> ExecutionResult {
        if let Err(failure) = self.preflight(batch) {
            warn!(caller = %self.owner, %failure, "Rejected batch");
            return ExecutionResult::failed(failure);
        }

        let checkpoint = ledger.checkpoint();
        match self.run(ledger, batch) {
            Ok(settlement) => {
                ledger.commit(checkpoint);
                info!(
                    caller = %self.owner,
                    steps = settlement.outputs.len(),
                    fee = settlement.fee,
                    refunded = settlement.refunded,
                    "Executed batch"
                );
                ExecutionResult::succeeded(settlement.outputs, settlement.fee, settlement.refunded)
            }
            Err(failure) => {
                ledger.revert(checkpoint);
                warn!(caller = %self.owner, %failure, "Batch aborted, state reverted");
                ExecutionResult::failed(failure)
            }
        }
    }

    fn preflight(&self, batch: &Batch) -> std::result::Result<(), BatchFailure> {
        if self.registry.is_halted() {
            return Err(BatchFailure::batch(KernelError::RegistryHalted));
        }
        if self.registry.is_banned(&self.owner) {
            return Err(BatchFailure::batch(KernelError::CallerBanned(self.owner)));
        }
        validation::validate_batch(batch, &self.config)
    }

    fn run(&self, ledger: &mut Ledger, batch: &Batch) -> std::result::Result<Settlement, BatchFailure> {
        let baseline = ledger.balance_of(self.address, Asset::Native);
        let fee = self
            .collect_value(ledger, batch)
            .map_err(BatchFailure::batch)?;

        let mut cache = Cache::new(self.config.max_stack_depth);
        let mut outputs = Vec::with_capacity(batch.len());
        for (index, step) in batch.steps.iter().enumerate() {
            let output = self
                .run_step(ledger, &mut cache, baseline, index, step)
                .map_err(|error| BatchFailure::at_step(index, error))?;
            outputs.push(output);
        }
        cache.clear();

        let refunded = self.refund(ledger, baseline).map_err(BatchFailure::batch)?;
        Ok(Settlement {
            outputs,
            fee,
            refunded,
        })
    }

    /// Escrow the attached value and charge the fee on it
    fn collect_value(&self, ledger: &mut Ledger, batch: &Batch) -> Result<u128> {
        if batch.value == 0 {
            return Ok(0);
        }
        let available = ledger.balance_of(self.owner, Asset::Native);
        if available < batch.value {
            return Err(KernelError::InsufficientAttachedValue {
                required: batch.value,
                available,
            });
        }
        ledger.transfer(Asset::Native, self.owner, self.address, batch.value)?;

        let Some(fee_rules) = &self.fee_rules else {
            return Ok(0);
        };
        let fee = fee_rules.compute_fee(&FeeContext {
            ledger: &*ledger,
            caller: self.owner,
            amount: batch.value,
            rules: &batch.fee_rules,
        })?;
        if fee > 0 {
            ledger.transfer(Asset::Native, self.address, fee_rules.collector(), fee)?;
            debug!(fee, collector = %fee_rules.collector(), "Charged fee");
        }
        Ok(fee)
    }

    /// Run one step.
    ///
    /// Arguments are resolved before the handler is looked up, so a step whose
    /// cache references cannot be satisfied reports the stack error even when
    /// its handler is not registered either.
    fn run_step(
        &self,
        ledger: &mut Ledger,
        cache: &mut Cache,
        baseline: u128,
        index: usize,
        step: &BatchStep,
    ) -> Result<StepOutput> {
        let args = step.payload.resolve(cache)?;

        // Looked up per step so a deregistration is never masked by a stale handle
        let module = self
            .registry
            .module(&step.handler)
            .ok_or(KernelError::HandlerNotRegistered(step.handler))?;
        let handler = module.handler;

        let value = step.value();
        let available = self.escrowed(ledger, baseline);
        if value > available {
            return Err(KernelError::InsufficientAttachedValue {
                required: value,
                available,
            });
        }

        let call = ResolvedCall::new(step.payload.selector.clone(), args);
        let failed = |source| KernelError::HandlerExecutionFailed {
            handler: step.handler,
            source,
        };
        let expected = handler.outputs(&call.selector).map_err(failed)?;

        debug!(
            step = index,
            handler = %step.handler,
            selector = %call.selector,
            value,
            "Invoking handler"
        );
        let values = {
            let mut ctx = InvocationContext::new(
                self.owner,
                self.address,
                module.address,
                index,
                value,
                ledger,
                cache,
                self.fee_rules.as_deref(),
            );
            handler.invoke(&mut ctx, &call).map_err(failed)?
        };

        check_contract(step.handler, expected, &values)?;
        let bytes = values
            .try_to_vec()
            .map_err(|err| KernelError::MalformedPayload(err.to_string()))?;
        for value in &values {
            cache.push(value.clone())?;
        }

        Ok(StepOutput {
            step: index,
            handler: step.handler,
            values,
            bytes,
        })
    }

    /// Attached value still held in escrow for the current batch
    fn escrowed(&self, ledger: &Ledger, baseline: u128) -> u128 {
        ledger
            .balance_of(self.address, Asset::Native)
            .saturating_sub(baseline)
    }

    /// Hand unspent attached value back to the caller
    fn refund(&self, ledger: &mut Ledger, baseline: u128) -> Result<u128> {
        let remaining = self.escrowed(ledger, baseline);
        if remaining > 0 {
            ledger.transfer(Asset::Native, self.address, self.owner, remaining)?;
            debug!(remaining, caller = %self.owner, "Returned unspent value");
        }
        Ok(remaining)
    }
}

fn check_contract(handler: HandlerId, expected: &[ValueKind], values: &[StackValue]) -> Result<()> {
    let actual: Vec<ValueKind> = values.iter().map(StackValue::kind).collect();
    if actual != expected {
        return Err(KernelError::OutputContractViolation {
            handler,
            expected: expected.to_vec(),
            actual,
        });
    }
    Ok(())
}
