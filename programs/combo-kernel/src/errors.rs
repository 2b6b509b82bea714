// Error catalog for combo-kernel batch processing
//
// Errors are split by layer. `LedgerError` is raised by the substrate when a
// balance or allowance cannot cover a write. `HandlerError` is what a handler
// module signals when its protocol operation fails. `KernelError` is the
// engine and registry taxonomy, and is what a failed batch reports to the
// caller, wrapped in a `BatchFailure` that names the offending step.
//
// Kernel errors carry stable numeric codes grouped by category so logs and
// diagnostics can be filtered without string matching.

use std::fmt;
use thiserror::Error;

use crate::types::{Address, Asset, HandlerId, ValueKind};

// ================================
// Ledger Errors
// ================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient {asset} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        asset: Asset,
        required: u128,
        available: u128,
    },

    #[error("Insufficient {asset} allowance for {spender} from {owner}: required {required}, available {available}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        asset: Asset,
        required: u128,
        available: u128,
    },

    #[error("Balance overflow")]
    Overflow,
}

// ================================
// Handler Errors
// ================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Unknown selector: {0}")]
    UnknownSelector(String),

    #[error("Missing argument {index}")]
    MissingArgument { index: usize },

    #[error("Argument {index} must be {expected}, got {actual}")]
    BadArgument {
        index: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Output below minimum: expected at least {minimum}, got {actual}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("No exchange for token {0}")]
    UnknownExchange(Address),

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Step value too small: required {required}, attached {attached}")]
    InsufficientValue { required: u128, attached: u128 },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Failed(String),
}

// ================================
// Kernel Errors
// ================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    // ===== Registry Errors (6100-6199) =====
    #[error("Unauthorized")]
    Unauthorized, // 6100

    #[error("Identifier {0} already maps to a different module")]
    DuplicateIdentifier(HandlerId), // 6101

    #[error("Unknown identifier {0}")]
    UnknownIdentifier(HandlerId), // 6102

    #[error("Invalid handler identifier: {0:?}")]
    InvalidIdentifier(String), // 6103

    #[error("Handler {0} is not registered")]
    HandlerNotRegistered(HandlerId), // 6104

    #[error("Registry is halted")]
    RegistryHalted, // 6105

    #[error("Caller {0} is banned")]
    CallerBanned(Address), // 6106

    #[error("Fee rule {0} already registered")]
    DuplicateFeeRule(u32), // 6107

    #[error("Unknown fee rule {0}")]
    UnknownFeeRule(u32), // 6108

    #[error("Fee rate {0} exceeds 10000 basis points")]
    InvalidFeeRate(u32), // 6109

    // ===== Batch Errors (6200-6299) =====
    #[error("Batch has no steps")]
    EmptyBatch, // 6200

    #[error("Batch has {steps} steps, maximum is {max}")]
    BatchTooLarge { steps: usize, max: usize }, // 6201

    #[error("Payload has {arguments} arguments, maximum is {max}")]
    PayloadTooLarge { arguments: usize, max: usize }, // 6202

    #[error("Malformed payload: {0}")]
    MalformedPayload(String), // 6203

    // ===== Stack Errors (6300-6399) =====
    #[error("Stack underflow: offset {offset} with depth {depth}")]
    StackUnderflow { offset: usize, depth: usize }, // 6300

    #[error("Stack overflow: maximum depth {max_depth}")]
    StackOverflow { max_depth: usize }, // 6301

    #[error("Invalid stack reference: offset {offset} can never exist below maximum depth {max_depth}")]
    InvalidReference { offset: usize, max_depth: usize }, // 6302

    // ===== Handler Errors (6400-6499) =====
    #[error("Handler {handler} failed: {source}")]
    HandlerExecutionFailed {
        handler: HandlerId,
        source: HandlerError,
    }, // 6400

    #[error("Handler {handler} returned {actual:?}, contract declares {expected:?}")]
    OutputContractViolation {
        handler: HandlerId,
        expected: Vec<ValueKind>,
        actual: Vec<ValueKind>,
    }, // 6401

    // ===== Value Errors (6500-6599) =====
    #[error("Insufficient attached value: required {required}, available {available}")]
    InsufficientAttachedValue { required: u128, available: u128 }, // 6500

    #[error(transparent)]
    Ledger(#[from] LedgerError), // 6501
}

impl KernelError {
    /// Stable numeric code for this error
    pub fn code(&self) -> u32 {
        match self {
            Self::Unauthorized => 6100,
            Self::DuplicateIdentifier(_) => 6101,
            Self::UnknownIdentifier(_) => 6102,
            Self::InvalidIdentifier(_) => 6103,
            Self::HandlerNotRegistered(_) => 6104,
            Self::RegistryHalted => 6105,
            Self::CallerBanned(_) => 6106,
            Self::DuplicateFeeRule(_) => 6107,
            Self::UnknownFeeRule(_) => 6108,
            Self::InvalidFeeRate(_) => 6109,
            Self::EmptyBatch => 6200,
            Self::BatchTooLarge { .. } => 6201,
            Self::PayloadTooLarge { .. } => 6202,
            Self::MalformedPayload(_) => 6203,
            Self::StackUnderflow { .. } => 6300,
            Self::StackOverflow { .. } => 6301,
            Self::InvalidReference { .. } => 6302,
            Self::HandlerExecutionFailed { .. } => 6400,
            Self::OutputContractViolation { .. } => 6401,
            Self::InsufficientAttachedValue { .. } => 6500,
            Self::Ledger(_) => 6501,
        }
    }
}

// ================================
// Batch Failure
// ================================

/// The single structured failure reported for an aborted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Index of the step that failed, `None` for batch-level failures
    pub step: Option<usize>,
    pub error: KernelError,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.step {
            write!(f, "step {index}: ")?;
        }
        write!(f, "{} (code {})", self.error, self.error.code())
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl BatchFailure {
    pub fn batch(error: KernelError) -> Self {
        Self { step: None, error }
    }

    pub fn at_step(step: usize, error: KernelError) -> Self {
        Self {
            step: Some(step),
            error,
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
