// Constant-product exchange handler
// Registry ID: HUniswap
// Purpose: Exact-input swaps against per-token native/token exchanges
//
// Every listed token has one exchange account holding a native reserve and a
// token reserve on the ledger. Prices follow the constant-product rule with a
// 0.3% fee taken from the input:
//
//     out = in * 997 * reserve_out / (reserve_in * 1000 + in * 997)
//
// Token to token swaps route through native: the input token is sold on its
// exchange and the native proceeds buy the output token on the other.
//
// Exchanges pay out through allowances they grant to the HUniswap module
// address (see `ExchangeDirectory::approve_module`).

use std::collections::BTreeMap;

use combo_kernel::{Address, Asset, Handler, HandlerError, InvocationContext, Ledger, ResolvedCall, StackValue, ValueKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const HANDLER_NAME: &str = "HUniswap";
pub const HANDLER_VERSION: u16 = 1;

const FEE_NUMERATOR: u128 = 997;
const FEE_DENOMINATOR: u128 = 1000;

// ================================
// Exchange Directory
// ================================

/// One listed token and the exchange account that trades it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeListing {
    pub token: Address,
    pub exchange: Address,
}

/// Token to exchange account mapping, fixed once the handler is built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ExchangeListing>", into = "Vec<ExchangeListing>")]
pub struct ExchangeDirectory {
    exchanges: BTreeMap<Address, Address>,
}

impl From<Vec<ExchangeListing>> for ExchangeDirectory {
    fn from(listings: Vec<ExchangeListing>) -> Self {
        listings.into_iter().collect()
    }
}

impl From<ExchangeDirectory> for Vec<ExchangeListing> {
    fn from(directory: ExchangeDirectory) -> Self {
        directory
            .exchanges
            .into_iter()
            .map(|(token, exchange)| ExchangeListing { token, exchange })
            .collect()
    }
}

impl FromIterator<ExchangeListing> for ExchangeDirectory {
    fn from_iter<I: IntoIterator<Item = ExchangeListing>>(listings: I) -> Self {
        Self {
            exchanges: listings
                .into_iter()
                .map(|listing| (listing.token, listing.exchange))
                .collect(),
        }
    }
}

impl ExchangeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange(mut self, token: Address, exchange: Address) -> Self {
        self.exchanges.insert(token, exchange);
        self
    }

    pub fn exchange_for(&self, token: Address) -> Result<Address, HandlerError> {
        self.exchanges
            .get(&token)
            .copied()
            .ok_or(HandlerError::UnknownExchange(token))
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.exchanges.iter()
    }

    /// Let `module` pay out of every listed exchange's reserves
    pub fn approve_module(&self, ledger: &mut Ledger, module: Address) {
        for (token, exchange) in &self.exchanges {
            ledger.approve(*exchange, module, Asset::Native, u128::MAX);
            ledger.approve(*exchange, module, Asset::Token(*token), u128::MAX);
        }
    }
}

/// Output amount for selling `input` into reserves `(reserve_in, reserve_out)`
pub fn input_price(input: u128, reserve_in: u128, reserve_out: u128) -> Result<u128, HandlerError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(HandlerError::InsufficientLiquidity);
    }
    let input_with_fee = input.checked_mul(FEE_NUMERATOR).ok_or(HandlerError::Overflow)?;
    let numerator = input_with_fee
        .checked_mul(reserve_out)
        .ok_or(HandlerError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(FEE_DENOMINATOR)
        .and_then(|scaled| scaled.checked_add(input_with_fee))
        .ok_or(HandlerError::Overflow)?;
    Ok(numerator / denominator)
}

struct Reserves {
    native: u128,
    token: u128,
}

fn reserves(ledger: &Ledger, exchange: Address, token: Address) -> Reserves {
    Reserves {
        native: ledger.balance_of(exchange, Asset::Native),
        token: ledger.balance_of(exchange, Asset::Token(token)),
    }
}

fn require_minimum(actual: u128, minimum: u128) -> Result<(), HandlerError> {
    if actual < minimum {
        return Err(HandlerError::SlippageExceeded { minimum, actual });
    }
    Ok(())
}

// ================================
// Handler
// ================================

#[derive(Debug, Clone)]
pub struct HUniswap {
    directory: ExchangeDirectory,
}

impl HUniswap {
    pub fn new(directory: ExchangeDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &ExchangeDirectory {
        &self.directory
    }

    /// Sell `value` of the step's attached native for `token`
    fn eth_to_token_swap_input(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<u128, HandlerError> {
        let value = call.amount(0)?;
        let token = call.address(1)?;
        let min_tokens = call.amount(2)?;

        let exchange = self.directory.exchange_for(token)?;
        let pool = reserves(ctx.ledger(), exchange, token);
        let bought = input_price(value, pool.native, pool.token)?;
        require_minimum(bought, min_tokens)?;

        ctx.spend_value(exchange, value)?;
        ctx.receive(Asset::Token(token), exchange, bought)?;
        debug!(%token, sold = value, bought, "Swapped native for token");
        Ok(bought)
    }

    /// Sell `tokens_sold` of `token` for native, paid to the caller
    fn token_to_eth_swap_input(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<u128, HandlerError> {
        let token = call.address(0)?;
        let tokens_sold = call.amount(1)?;
        let min_eth = call.amount(2)?;

        let exchange = self.directory.exchange_for(token)?;
        let pool = reserves(ctx.ledger(), exchange, token);
        let bought = input_price(tokens_sold, pool.token, pool.native)?;
        require_minimum(bought, min_eth)?;

        ctx.pay(Asset::Token(token), exchange, tokens_sold)?;
        ctx.receive(Asset::Native, exchange, bought)?;
        debug!(%token, sold = tokens_sold, bought, "Swapped token for native");
        Ok(bought)
    }

    /// Sell `tokens_sold` of `token_in` for `token_out` via native
    fn token_to_token_swap_input(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<u128, HandlerError> {
        let token_in = call.address(0)?;
        let tokens_sold = call.amount(1)?;
        let min_out = call.amount(2)?;
        let token_out = call.address(3)?;

        let exchange_in = self.directory.exchange_for(token_in)?;
        let exchange_out = self.directory.exchange_for(token_out)?;

        let pool_in = reserves(ctx.ledger(), exchange_in, token_in);
        let native_bought = input_price(tokens_sold, pool_in.token, pool_in.native)?;
        ctx.pay(Asset::Token(token_in), exchange_in, tokens_sold)?;
        ctx.receive(Asset::Native, exchange_in, native_bought)?;

        // second leg prices against reserves after the first leg settled
        let pool_out = reserves(ctx.ledger(), exchange_out, token_out);
        let bought = input_price(native_bought, pool_out.native, pool_out.token)?;
        require_minimum(bought, min_out)?;
        ctx.transfer(Asset::Native, exchange_out, native_bought)?;
        ctx.receive(Asset::Token(token_out), exchange_out, bought)?;
        debug!(%token_in, %token_out, sold = tokens_sold, bought, "Swapped token for token");
        Ok(bought)
    }
}

impl Handler for HUniswap {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    fn version(&self) -> u16 {
        HANDLER_VERSION
    }

    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        match selector {
            "eth_to_token_swap_input" | "token_to_eth_swap_input" | "token_to_token_swap_input" => {
                Ok(&[ValueKind::Amount])
            }
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        let bought = match call.selector.as_str() {
            "eth_to_token_swap_input" => self.eth_to_token_swap_input(ctx, call)?,
            "token_to_eth_swap_input" => self.token_to_eth_swap_input(ctx, call)?,
            "token_to_token_swap_input" => self.token_to_token_swap_input(ctx, call)?,
            other => return Err(HandlerError::UnknownSelector(other.to_string())),
        };
        Ok(vec![StackValue::Amount(bought)])
    }
}
