// Batch and step payload types
//
// A batch is the unit of atomic execution: an ordered list of steps, each
// naming a handler by identifier and carrying a typed payload. Payload
// arguments are either literals supplied by the caller or references into the
// per-batch cache. References are resolved by the engine immediately before
// the step's handler is invoked, so handlers only ever see concrete values.
//
// WIRE FORMAT: payloads encode to borsh bytes, which is the form a step takes
// on the external execution interface.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::errors::{KernelError, Result};
use crate::types::{HandlerId, StackValue};

// ================================
// Arguments
// ================================

/// One argument slot of a step payload
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Argument {
    /// A value supplied by the caller
    Literal(StackValue),
    /// The cache frame `offset` below the top, read without consuming it
    Peek { offset: u16 },
    /// The top cache frame, consumed
    Pop,
}

impl Argument {
    pub fn amount(amount: u128) -> Self {
        Self::Literal(StackValue::Amount(amount))
    }

    pub fn address(address: crate::types::Address) -> Self {
        Self::Literal(StackValue::Address(address))
    }

    pub fn flag(flag: bool) -> Self {
        Self::Literal(StackValue::Bool(flag))
    }

    pub fn peek(offset: u16) -> Self {
        Self::Peek { offset }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

// ================================
// Payload
// ================================

/// Selector plus argument descriptors for one handler call
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Payload {
    pub selector: String,
    pub args: Vec<Argument>,
}

impl Payload {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, argument: Argument) -> Self {
        self.args.push(argument);
        self
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.try_to_vec()
            .map_err(|err| KernelError::MalformedPayload(err.to_string()))
    }

    /// Decode from wire bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::try_from_slice(bytes).map_err(|err| KernelError::MalformedPayload(err.to_string()))
    }

    /// Replace every cache reference with the value it names.
    ///
    /// Arguments are resolved left to right, so a `Pop` changes what later
    /// `Peek` offsets in the same payload refer to.
    pub fn resolve(&self, cache: &mut Cache) -> Result<Vec<StackValue>> {
        let mut resolved = Vec::with_capacity(self.args.len());
        for argument in &self.args {
            let value = match argument {
                Argument::Literal(value) => value.clone(),
                Argument::Peek { offset } => cache.peek_at(usize::from(*offset))?.clone(),
                Argument::Pop => cache.pop()?,
            };
            resolved.push(value);
        }
        Ok(resolved)
    }
}

// ================================
// Steps and Batches
// ================================

/// One handler invocation inside a batch
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BatchStep {
    pub handler: HandlerId,
    pub payload: Payload,
    /// Native value this step draws from the batch's attached value
    pub value: Option<u128>,
}

impl BatchStep {
    pub fn new(handler: HandlerId, payload: Payload) -> Self {
        Self {
            handler,
            payload,
            value: None,
        }
    }

    /// Build a step from wire-encoded payload bytes
    pub fn from_encoded(handler: HandlerId, payload: &[u8], value: Option<u128>) -> Result<Self> {
        Ok(Self {
            handler,
            payload: Payload::decode(payload)?,
            value,
        })
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = Some(value);
        self
    }

    pub fn value(&self) -> u128 {
        self.value.unwrap_or(0)
    }
}

/// An ordered list of steps submitted for atomic execution
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Batch {
    pub steps: Vec<BatchStep>,
    /// Native value the caller attaches to the whole batch
    pub value: u128,
    /// Fee rule indexes the caller claims discounts under
    pub fee_rules: Vec<u32>,
}

impl Batch {
    pub fn new(steps: Vec<BatchStep>) -> Self {
        Self {
            steps,
            value: 0,
            fee_rules: Vec::new(),
        }
    }

    pub fn step(mut self, step: BatchStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn with_fee_rules(mut self, rules: Vec<u32>) -> Self {
        self.fee_rules = rules;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of the native value every step declares
    pub fn declared_value(&self) -> Option<u128> {
        self.steps
            .iter()
            .try_fold(0u128, |total, step| total.checked_add(step.value()))
    }
}
