//! Representative protocol handlers for the combo kernel
//!
//! Each handler adapts one protocol's calling convention to the kernel's
//! `Handler` trait and is registered under the name in its `HANDLER_NAME`.

// ================================
// Module Declarations
// ================================

pub mod funds;
pub mod uniswap;
pub mod wrapped;

// ================================
// Public API Exports
// ================================

pub use funds::HFunds;
pub use uniswap::{input_price, ExchangeDirectory, ExchangeListing, HUniswap};
pub use wrapped::HWrappedNative;

/// Registry names of every handler in this crate
pub const HANDLER_NAMES: [&str; 3] = [
    funds::HANDLER_NAME,
    uniswap::HANDLER_NAME,
    wrapped::HANDLER_NAME,
];
