// Batch validation for combo-kernel
//
// Batches arrive from untrusted callers. Before the proxy opens a ledger
// transaction it checks the shape of the batch against the proxy's configured
// limits so that a malformed batch is rejected without touching any state:
// - an empty batch, or one with more steps than `max_batch_steps`
// - a step payload with more arguments than `max_arguments`
// - steps that declare more native value than the caller attached
//
// Cache references are not checked here; whether an offset exists depends on
// what earlier steps push, so the engine resolves them step by step.

use crate::batch::{Batch, Payload};
use crate::config::KernelConfig;
use crate::errors::{BatchFailure, KernelError, Result};

/// Validate the number of arguments in one payload
pub fn validate_payload(payload: &Payload, max_arguments: usize) -> Result<()> {
    if payload.args.len() > max_arguments {
        return Err(KernelError::PayloadTooLarge {
            arguments: payload.args.len(),
            max: max_arguments,
        });
    }
    Ok(())
}

/// Validate that the attached value covers what the steps declare
pub fn validate_attached_value(batch: &Batch) -> Result<()> {
    let declared = batch.declared_value().ok_or(KernelError::InsufficientAttachedValue {
        required: u128::MAX,
        available: batch.value,
    })?;
    if declared > batch.value {
        return Err(KernelError::InsufficientAttachedValue {
            required: declared,
            available: batch.value,
        });
    }
    Ok(())
}

/// Validate a whole batch against `config`
pub fn validate_batch(batch: &Batch, config: &KernelConfig) -> std::result::Result<(), BatchFailure> {
    if batch.is_empty() {
        return Err(BatchFailure::batch(KernelError::EmptyBatch));
    }
    if batch.len() > config.max_batch_steps {
        return Err(BatchFailure::batch(KernelError::BatchTooLarge {
            steps: batch.len(),
            max: config.max_batch_steps,
        }));
    }
    for (index, step) in batch.steps.iter().enumerate() {
        validate_payload(&step.payload, config.max_arguments)
            .map_err(|error| BatchFailure::at_step(index, error))?;
    }
    validate_attached_value(batch).map_err(BatchFailure::batch)
}
