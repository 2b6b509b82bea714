// Handler module interface
//
// Every protocol adapter implements `Handler`. The registry maps identifiers
// to `Arc<dyn Handler>` and the proxy dispatches each batch step through this
// trait, handing the handler an `InvocationContext` that is scoped to the
// batch's caller.
//
// CONTEXT PRESERVATION: a handler never holds a ledger reference of its own.
// Every write it performs goes through the context, which attributes debits
// and credits to the caller's account, and native spending to the value the
// caller attached to the step. The handler module's own identity never
// appears in a balance change. Funds only leave another account through an
// allowance that account granted to the invoked module's address.
//
// OUTPUT CONTRACT: `outputs` declares, per selector, the kinds and order of the
// values `invoke` returns. The proxy rejects any invocation whose return values
// do not match and pushes matching values onto the cache in declared order.

use crate::cache::Cache;
use crate::errors::{HandlerError, LedgerError};
use crate::fee::FeeRuleRegistry;
use crate::ledger::Ledger;
use crate::types::{Address, Asset, StackValue, ValueKind};

// ================================
// Handler Trait
// ================================

pub trait Handler: Send + Sync {
    /// Human readable handler name
    fn name(&self) -> &'static str;

    /// Interface version of this handler
    fn version(&self) -> u16 {
        1
    }

    /// Kinds of the values `invoke` returns for `selector`, in push order
    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError>;

    /// Perform the protocol operation named by `call.selector`
    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError>;
}

// ================================
// Resolved Call
// ================================

/// A step payload after every cache reference has been substituted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCall {
    pub selector: String,
    pub args: Vec<StackValue>,
}

impl ResolvedCall {
    pub fn new(selector: impl Into<String>, args: Vec<StackValue>) -> Self {
        Self {
            selector: selector.into(),
            args,
        }
    }

    fn arg(&self, index: usize) -> Result<&StackValue, HandlerError> {
        self.args
            .get(index)
            .ok_or(HandlerError::MissingArgument { index })
    }

    fn mismatch(&self, index: usize, expected: ValueKind) -> HandlerError {
        match self.args.get(index) {
            Some(value) => HandlerError::BadArgument {
                index,
                expected,
                actual: value.kind(),
            },
            None => HandlerError::MissingArgument { index },
        }
    }

    pub fn amount(&self, index: usize) -> Result<u128, HandlerError> {
        self.arg(index)?
            .as_amount()
            .ok_or_else(|| self.mismatch(index, ValueKind::Amount))
    }

    pub fn address(&self, index: usize) -> Result<Address, HandlerError> {
        self.arg(index)?
            .as_address()
            .ok_or_else(|| self.mismatch(index, ValueKind::Address))
    }

    pub fn flag(&self, index: usize) -> Result<bool, HandlerError> {
        self.arg(index)?
            .as_bool()
            .ok_or_else(|| self.mismatch(index, ValueKind::Bool))
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8], HandlerError> {
        self.arg(index)?
            .as_bytes()
            .ok_or_else(|| self.mismatch(index, ValueKind::Bytes))
    }
}

// ================================
// Invocation Context
// ================================

/// Caller-scoped view of the substrate for the duration of one step
pub struct InvocationContext<'a> {
    caller: Address,
    escrow: Address,
    module: Address,
    step: usize,
    value: u128,
    ledger: &'a mut Ledger,
    cache: &'a mut Cache,
    fee_rules: Option<&'a FeeRuleRegistry>,
}

impl<'a> InvocationContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        caller: Address,
        escrow: Address,
        module: Address,
        step: usize,
        value: u128,
        ledger: &'a mut Ledger,
        cache: &'a mut Cache,
        fee_rules: Option<&'a FeeRuleRegistry>,
    ) -> Self {
        Self {
            caller,
            escrow,
            module,
            step,
            value,
            ledger,
            cache,
            fee_rules,
        }
    }

    /// The account every write of this invocation is attributed to
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Address of the handler module being invoked
    pub fn module(&self) -> Address {
        self.module
    }

    /// Index of the step being executed
    pub fn step(&self) -> usize {
        self.step
    }

    /// Native value still available to this step
    pub fn value(&self) -> u128 {
        self.value
    }

    /// Read-only view of the substrate, for pricing against venue reserves
    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    /// The caller's balance of `asset`
    pub fn balance_of(&self, asset: Asset) -> u128 {
        self.ledger.balance_of(self.caller, asset)
    }

    pub fn cache(&self) -> &Cache {
        &*self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut *self.cache
    }

    pub fn fee_rules(&self) -> Option<&FeeRuleRegistry> {
        self.fee_rules
    }

    // ===== Caller-scoped writes =====

    /// Pay `amount` of `asset` from the caller to `to`.
    ///
    /// Native payments are drawn from the value attached to this step.
    pub fn pay(&mut self, asset: Asset, to: Address, amount: u128) -> Result<(), HandlerError> {
        match asset {
            Asset::Native => self.spend_value(to, amount),
            Asset::Token(_) => Ok(self.ledger.transfer(asset, self.caller, to, amount)?),
        }
    }

    /// Move `amount` of `asset` out of the caller's own balance, native included
    pub fn transfer(&mut self, asset: Asset, to: Address, amount: u128) -> Result<(), HandlerError> {
        Ok(self.ledger.transfer(asset, self.caller, to, amount)?)
    }

    /// Credit the caller with `amount` of `asset` paid out by `from`.
    ///
    /// `from` must have approved the invoked module for `asset`; the allowance
    /// is consumed.
    pub fn receive(&mut self, asset: Asset, from: Address, amount: u128) -> Result<(), HandlerError> {
        Ok(self
            .ledger
            .transfer_from(self.module, from, self.caller, asset, amount)?)
    }

    /// Spend native value attached to this step
    pub fn spend_value(&mut self, to: Address, amount: u128) -> Result<(), HandlerError> {
        if amount > self.value {
            return Err(HandlerError::InsufficientValue {
                required: amount,
                attached: self.value,
            });
        }
        self.ledger.transfer(Asset::Native, self.escrow, to, amount)?;
        self.value -= amount;
        Ok(())
    }

    /// Mint `amount` of a token straight to the caller (token contracts only)
    pub fn mint(&mut self, token: Address, amount: u128) -> Result<(), HandlerError> {
        Ok(self.ledger.mint(self.caller, Asset::Token(token), amount)?)
    }

    /// Burn `amount` of a token held by the caller (token contracts only)
    pub fn burn(&mut self, token: Address, amount: u128) -> Result<(), HandlerError> {
        Ok(self.ledger.burn(self.caller, Asset::Token(token), amount)?)
    }

    /// Set the caller's allowance for `spender` on `asset`
    pub fn approve(&mut self, asset: Asset, spender: Address, amount: u128) {
        self.ledger.approve(self.caller, spender, asset, amount);
    }

    /// Require the caller to hold at least `amount` of `asset`
    pub fn require_balance(&self, asset: Asset, amount: u128) -> Result<(), HandlerError> {
        let available = self.balance_of(asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: self.caller,
                asset,
                required: amount,
                available,
            }
            .into());
        }
        Ok(())
    }
}
