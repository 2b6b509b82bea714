// Funds handler
// Registry ID: HFunds
// Purpose: Move the caller's assets and guard balances between steps

use combo_kernel::{Address, Asset, Handler, HandlerError, InvocationContext, ResolvedCall, StackValue, ValueKind};
use tracing::debug;

pub const HANDLER_NAME: &str = "HFunds";
pub const HANDLER_VERSION: u16 = 1;

/// Address that `balance_of` and `send_token` read as the native asset
pub const NATIVE: Address = Address::ZERO;

/// Asset plumbing: token and value transfers, balance reads, slippage guards.
///
/// Addresses are interpreted with `Asset::from_address`, so the zero address
/// names the native asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct HFunds;

impl HFunds {
    pub fn new() -> Self {
        Self
    }

    fn send_token(ctx: &mut InvocationContext<'_>, call: &ResolvedCall) -> Result<Vec<StackValue>, HandlerError> {
        let asset = Asset::from_address(call.address(0)?);
        let to = call.address(1)?;
        let amount = call.amount(2)?;
        ctx.pay(asset, to, amount)?;
        debug!(%asset, %to, amount, "Sent token");
        Ok(vec![])
    }

    fn send_value(ctx: &mut InvocationContext<'_>, call: &ResolvedCall) -> Result<Vec<StackValue>, HandlerError> {
        let to = call.address(0)?;
        let amount = call.amount(1)?;
        ctx.spend_value(to, amount)?;
        debug!(%to, amount, "Sent value");
        Ok(vec![])
    }

    fn balance_of(ctx: &InvocationContext<'_>, call: &ResolvedCall) -> Result<Vec<StackValue>, HandlerError> {
        let asset = Asset::from_address(call.address(0)?);
        Ok(vec![StackValue::Amount(ctx.balance_of(asset))])
    }

    fn check_slippage(ctx: &InvocationContext<'_>, call: &ResolvedCall) -> Result<Vec<StackValue>, HandlerError> {
        let asset = Asset::from_address(call.address(0)?);
        let minimum = call.amount(1)?;
        let actual = ctx.balance_of(asset);
        if actual < minimum {
            return Err(HandlerError::SlippageExceeded { minimum, actual });
        }
        Ok(vec![])
    }
}

impl Handler for HFunds {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    fn version(&self) -> u16 {
        HANDLER_VERSION
    }

    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        match selector {
            "send_token" | "send_value" | "check_slippage" => Ok(&[]),
            "balance_of" => Ok(&[ValueKind::Amount]),
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        match call.selector.as_str() {
            "send_token" => Self::send_token(ctx, call),
            "send_value" => Self::send_value(ctx, call),
            "balance_of" => Self::balance_of(ctx, call),
            "check_slippage" => Self::check_slippage(ctx, call),
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }
}
