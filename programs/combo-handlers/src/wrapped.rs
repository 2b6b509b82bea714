// Wrapped native handler
// Registry ID: HWrappedNative
// Purpose: 1:1 conversion between the native asset and its token form

use combo_kernel::{
    Address, Asset, Handler, HandlerError, InvocationContext, Ledger, ResolvedCall, StackValue,
    ValueKind,
};
use tracing::debug;

pub const HANDLER_NAME: &str = "HWrappedNative";
pub const HANDLER_VERSION: u16 = 1;

/// Wraps attached native value into `token` and unwraps it again.
///
/// The native backing every wrapped unit sits in the `reserve` account, which
/// must approve the module before withdrawals can pay out.
#[derive(Debug, Clone, Copy)]
pub struct HWrappedNative {
    token: Address,
    reserve: Address,
}

impl HWrappedNative {
    pub fn new(token: Address, reserve: Address) -> Self {
        Self { token, reserve }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn reserve(&self) -> Address {
        self.reserve
    }

    /// Let `module` pay withdrawals out of the reserve
    pub fn approve_module(&self, ledger: &mut Ledger, module: Address) {
        ledger.approve(self.reserve, module, Asset::Native, u128::MAX);
    }

    fn deposit(&self, ctx: &mut InvocationContext<'_>, amount: u128) -> Result<u128, HandlerError> {
        ctx.spend_value(self.reserve, amount)?;
        ctx.mint(self.token, amount)?;
        debug!(amount, "Wrapped native");
        Ok(amount)
    }

    fn withdraw(&self, ctx: &mut InvocationContext<'_>, amount: u128) -> Result<u128, HandlerError> {
        ctx.burn(self.token, amount)?;
        ctx.receive(Asset::Native, self.reserve, amount)?;
        debug!(amount, "Unwrapped native");
        Ok(amount)
    }
}

impl Handler for HWrappedNative {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    fn version(&self) -> u16 {
        HANDLER_VERSION
    }

    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        match selector {
            "deposit" | "withdraw" => Ok(&[ValueKind::Amount]),
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        let amount = call.amount(0)?;
        let converted = match call.selector.as_str() {
            "deposit" => self.deposit(ctx, amount)?,
            "withdraw" => self.withdraw(ctx, amount)?,
            other => return Err(HandlerError::UnknownSelector(other.to_string())),
        };
        Ok(vec![StackValue::Amount(converted)])
    }
}
