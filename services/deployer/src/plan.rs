//! Batch plans
//!
//! A plan is a JSON document describing a genesis ledger, the exchanges to
//! list, optional fee rules and one batch to execute on behalf of a caller.
//! Accounts and tokens are named by label; every label maps to the address
//! `Address::from_label(label)`. Exchange accounts are labelled
//! `exchange:<token>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use combo_handlers::{ExchangeDirectory, ExchangeListing};
use combo_kernel::{
    Address, Argument, Asset, Batch, BatchStep, HandlerId, HoldingRule, Ledger, Payload, StackValue,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::deploy::{approve_venues, AddressBook, Deployer, Deployment};

const WRAPPED_TOKEN: &str = "wrapped-native";
const WRAPPED_RESERVE: &str = "wrapped-native-reserve";
const FEE_COLLECTOR: &str = "fee-collector";

// ================================
// Plan Documents
// ================================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Label of the account the batch runs for
    pub caller: String,
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeSeed>,
    #[serde(default)]
    pub fee_rules: Vec<FeeRuleSeed>,
    pub batch: PlanBatch,
}

/// Starting balance of one account; `token` absent means native
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisBalance {
    pub account: String,
    #[serde(default)]
    pub token: Option<String>,
    pub amount: u128,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeSeed {
    pub token: String,
    pub native_reserve: u128,
    pub token_reserve: u128,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeRuleSeed {
    pub index: u32,
    pub token: String,
    pub min_balance: u128,
    pub discount_bps: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanBatch {
    #[serde(default)]
    pub value: u128,
    #[serde(default)]
    pub fee_rules: Vec<u32>,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanStep {
    pub handler: String,
    pub selector: String,
    #[serde(default)]
    pub args: Vec<PlanArgument>,
    #[serde(default)]
    pub value: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanArgument {
    Amount(u128),
    /// An account or token label
    Address(String),
    /// The native asset marker
    Native,
    Flag(bool),
    Peek(u16),
    Pop,
}

impl PlanArgument {
    fn resolve(&self) -> Argument {
        match self {
            Self::Amount(amount) => Argument::amount(*amount),
            Self::Address(label) => Argument::address(Address::from_label(label)),
            Self::Native => Argument::address(Address::ZERO),
            Self::Flag(flag) => Argument::flag(*flag),
            Self::Peek(offset) => Argument::peek(*offset),
            Self::Pop => Argument::Pop,
        }
    }
}

impl Plan {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid plan")
    }

    fn exchange_directory(&self) -> ExchangeDirectory {
        self.exchanges
            .iter()
            .map(|seed| ExchangeListing {
                token: Address::from_label(&seed.token),
                exchange: exchange_account(&seed.token),
            })
            .collect()
    }

    fn genesis(&self) -> Result<Ledger> {
        let mut ledger = Ledger::new();
        for entry in &self.balances {
            let asset = match &entry.token {
                Some(token) => Asset::Token(Address::from_label(token)),
                None => Asset::Native,
            };
            ledger
                .mint(Address::from_label(&entry.account), asset, entry.amount)
                .with_context(|| format!("Invalid genesis balance for {}", entry.account))?;
        }
        for seed in &self.exchanges {
            let exchange = exchange_account(&seed.token);
            ledger.mint(exchange, Asset::Native, seed.native_reserve)?;
            ledger.mint(exchange, Asset::Token(Address::from_label(&seed.token)), seed.token_reserve)?;
        }
        Ok(ledger)
    }

    fn batch(&self) -> Result<Batch> {
        let mut steps = Vec::with_capacity(self.batch.steps.len());
        for (index, step) in self.batch.steps.iter().enumerate() {
            let handler = HandlerId::from_name(&step.handler)
                .with_context(|| format!("Invalid handler name in step {index}"))?;
            let payload = step
                .args
                .iter()
                .fold(Payload::new(step.selector.as_str()), |payload, arg| payload.arg(arg.resolve()));
            let mut built = BatchStep::new(handler, payload);
            built.value = step.value;
            steps.push(built);
        }
        Ok(Batch::new(steps)
            .with_value(self.batch.value)
            .with_fee_rules(self.batch.fee_rules.clone()))
    }

    /// Every label the plan mentions, for reporting balances
    fn labels(&self) -> Vec<String> {
        let mut labels = vec![self.caller.clone()];
        labels.extend(self.balances.iter().map(|entry| entry.account.clone()));
        labels.sort();
        labels.dedup();
        labels
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .balances
            .iter()
            .filter_map(|entry| entry.token.clone())
            .chain(self.exchanges.iter().map(|seed| seed.token.clone()))
            .chain(self.fee_rules.iter().map(|rule| rule.token.clone()))
            .chain(std::iter::once(WRAPPED_TOKEN.to_string()))
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }
}

fn exchange_account(token: &str) -> Address {
    Address::from_label(&format!("exchange:{token}"))
}

// ================================
// Reports
// ================================

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub handler: String,
    pub values: Vec<StackValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    pub outputs: Vec<StepReport>,
    pub fee: u128,
    pub refunded: u128,
    pub addresses: AddressBook,
    /// Non-zero balances per account label, keyed by asset label
    pub balances: BTreeMap<String, BTreeMap<String, u128>>,
}

fn balances(ledger: &Ledger, plan: &Plan) -> BTreeMap<String, BTreeMap<String, u128>> {
    let tokens = plan.tokens();
    plan.labels()
        .into_iter()
        .map(|label| {
            let account = Address::from_label(&label);
            let mut held = BTreeMap::new();
            let native = ledger.balance_of(account, Asset::Native);
            if native > 0 {
                held.insert("native".to_string(), native);
            }
            for token in &tokens {
                let amount = ledger.balance_of(account, Asset::Token(Address::from_label(token)));
                if amount > 0 {
                    held.insert(token.clone(), amount);
                }
            }
            (label, held)
        })
        .collect()
}

// ================================
// Runner
// ================================

/// Deploy the handlers, seed the ledger and execute the plan's batch
pub fn run(config: &Config, plan: &Plan) -> Result<Report> {
    let deployer = Deployer::new(config.kernel())
        .with_fees(config.basis_fee_bps, Address::from_label(FEE_COLLECTOR))
        .context("Invalid fee configuration")?;
    if let Some(fees) = deployer.fee_rules() {
        for rule in &plan.fee_rules {
            fees.register_rule(
                deployer.cap(),
                rule.index,
                Arc::new(HoldingRule {
                    token: Address::from_label(&rule.token),
                    min_balance: rule.min_balance,
                    discount_bps: rule.discount_bps,
                }),
            )
            .with_context(|| format!("Failed to register fee rule {}", rule.index))?;
        }
    }

    let deployment = Deployment {
        exchanges: plan.exchange_directory(),
        wrapped_token: Address::from_label(WRAPPED_TOKEN),
        wrapped_reserve: Address::from_label(WRAPPED_RESERVE),
    };
    let addresses = deployer.deploy(&deployment).context("Deployment failed")?;

    let mut ledger = plan.genesis()?;
    approve_venues(&mut ledger, &deployment, &addresses).context("Failed to approve venues")?;
    let batch = plan.batch()?;
    let proxy = deployer.build_proxy(Address::from_label(&plan.caller));
    info!(caller = %plan.caller, steps = batch.len(), "Executing plan");

    let result = proxy.execute(&mut ledger, &batch);
    if let Some(failure) = &result.failure {
        warn!(%failure, "Plan batch failed");
    }

    let outputs = result
        .outputs
        .iter()
        .map(|output| StepReport {
            step: output.step,
            handler: output.handler.to_string(),
            values: output.values.clone(),
        })
        .collect();
    Ok(Report {
        success: result.success,
        failure: result.failure.as_ref().map(ToString::to_string),
        failed_step: result.failure.as_ref().and_then(|failure| failure.step),
        outputs,
        fee: result.fee,
        refunded: result.refunded,
        addresses,
        balances: balances(&ledger, plan),
    })
}
