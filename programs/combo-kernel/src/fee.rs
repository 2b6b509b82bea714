// Fee rule registry
//
// Incidental charges are an opaque, pluggable policy. A proxy configured with
// a fee rule registry charges a fee on the native value attached to each
// batch before any step runs. The rate starts at the basis rate and is
// multiplied by the discount of every rule the caller names and qualifies
// for.
//
// All rates are in basis points out of `FEE_BASE`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::errors::{KernelError, LedgerError, Result};
use crate::ledger::Ledger;
use crate::registry::AdminCap;
use crate::types::{Address, Asset};

/// Denominator of every rate
pub const FEE_BASE: u32 = 10_000;

// ================================
// Fee Rules
// ================================

pub trait FeeRule: Send + Sync {
    /// Discounted rate for `caller`, `None` when the caller does not qualify
    fn discount_bps(&self, ledger: &Ledger, caller: Address) -> Option<u32>;
}

/// Discount for callers holding at least `min_balance` of `token`
#[derive(Debug, Clone, Copy)]
pub struct HoldingRule {
    pub token: Address,
    pub min_balance: u128,
    pub discount_bps: u32,
}

impl FeeRule for HoldingRule {
    fn discount_bps(&self, ledger: &Ledger, caller: Address) -> Option<u32> {
        (ledger.balance_of(caller, Asset::Token(self.token)) >= self.min_balance)
            .then_some(self.discount_bps)
    }
}

/// Inputs to one fee computation
#[derive(Debug, Clone)]
pub struct FeeContext<'a> {
    pub ledger: &'a Ledger,
    pub caller: Address,
    pub amount: u128,
    pub rules: &'a [u32],
}

// ================================
// Fee Rule Registry
// ================================

pub struct FeeRuleRegistry {
    admin: Uuid,
    basis_fee_bps: AtomicU32,
    collector: Address,
    rules: DashMap<u32, Arc<dyn FeeRule>>,
}

impl FeeRuleRegistry {
    /// Create a fee registry administered by `cap`
    pub fn new(cap: &AdminCap, basis_fee_bps: u32, collector: Address) -> Result<Self> {
        validate_rate(basis_fee_bps)?;
        Ok(Self {
            admin: cap.key(),
            basis_fee_bps: AtomicU32::new(basis_fee_bps),
            collector,
            rules: DashMap::new(),
        })
    }

    fn authorize(&self, cap: &AdminCap) -> Result<()> {
        if cap.key() == self.admin {
            Ok(())
        } else {
            Err(KernelError::Unauthorized)
        }
    }

    pub fn collector(&self) -> Address {
        self.collector
    }

    pub fn basis_fee_bps(&self) -> u32 {
        self.basis_fee_bps.load(Ordering::SeqCst)
    }

    pub fn set_basis_fee(&self, cap: &AdminCap, basis_fee_bps: u32) -> Result<()> {
        self.authorize(cap)?;
        validate_rate(basis_fee_bps)?;
        self.basis_fee_bps.store(basis_fee_bps, Ordering::SeqCst);
        info!(basis_fee_bps, "Updated basis fee");
        Ok(())
    }

    pub fn register_rule(&self, cap: &AdminCap, index: u32, rule: Arc<dyn FeeRule>) -> Result<()> {
        self.authorize(cap)?;
        match self.rules.entry(index) {
            Entry::Occupied(_) => Err(KernelError::DuplicateFeeRule(index)),
            Entry::Vacant(slot) => {
                slot.insert(rule);
                info!(index, "Registered fee rule");
                Ok(())
            }
        }
    }

    pub fn unregister_rule(&self, cap: &AdminCap, index: u32) -> Result<()> {
        self.authorize(cap)?;
        self.rules
            .remove(&index)
            .map(|_| info!(index, "Unregistered fee rule"))
            .ok_or(KernelError::UnknownFeeRule(index))
    }

    /// Effective rate for `caller` under the named rules.
    ///
    /// Each rule index counts once no matter how often it is named.
    pub fn fee_rate(&self, ledger: &Ledger, caller: Address, rules: &[u32]) -> Result<u32> {
        let mut rate = u64::from(self.basis_fee_bps());
        let unique: BTreeSet<u32> = rules.iter().copied().collect();
        for index in unique {
            let rule = self
                .rules
                .get(&index)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or(KernelError::UnknownFeeRule(index))?;
            if let Some(discount) = rule.discount_bps(ledger, caller) {
                rate = rate * u64::from(discount.min(FEE_BASE)) / u64::from(FEE_BASE);
            }
        }
        // rate never grows above the basis rate, which fits in u32
        Ok(rate as u32)
    }

    /// Fee owed on `context.amount`
    pub fn compute_fee(&self, context: &FeeContext<'_>) -> Result<u128> {
        let rate = self.fee_rate(context.ledger, context.caller, context.rules)?;
        let fee = context
            .amount
            .checked_mul(u128::from(rate))
            .ok_or(LedgerError::Overflow)?
            / u128::from(FEE_BASE);
        Ok(fee)
    }
}

fn validate_rate(rate: u32) -> Result<()> {
    if rate > FEE_BASE {
        return Err(KernelError::InvalidFeeRate(rate));
    }
    Ok(())
}
