// Scripted handler and strategies shared by the property tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use combo_kernel::{
    Address, AdminCap, Argument, Asset, BatchStep, Handler, HandlerError, HandlerId,
    InvocationContext, KernelConfig, Ledger, ModuleRef, Payload, Proxy, Registry, ResolvedCall,
    StackValue, ValueKind,
};
use proptest::prelude::*;

pub const STARTING_NATIVE: u128 = 1_000_000;

/// One scripted step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Push an amount onto the cache
    Push(u128),
    /// Mint `amount` of token `index` to the caller
    Mint(u8, u128),
    /// Pay `amount` of native to the sink out of attached value
    Spend(u128),
    /// Record a tag in the shared log
    Note(u128),
    Fail,
}

pub fn tokens() -> [Address; 3] {
    [
        Address::from_label("token-0"),
        Address::from_label("token-1"),
        Address::from_label("token-2"),
    ]
}

pub fn sink() -> Address {
    Address::from_label("sink")
}

pub fn script_id() -> HandlerId {
    HandlerId::from_name("HScript").unwrap()
}

/// Executes `Op`s and logs every `Note`
#[derive(Default)]
pub struct ScriptHandler {
    pub notes: Mutex<Vec<(usize, u128)>>,
}

impl Handler for ScriptHandler {
    fn name(&self) -> &'static str {
        "script"
    }

    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        match selector {
            "push" | "depth" | "read" => Ok(&[ValueKind::Amount]),
            "mint" | "spend" | "note" | "fail" => Ok(&[]),
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        match call.selector.as_str() {
            "push" | "read" => Ok(vec![StackValue::Amount(call.amount(0)?)]),
            "depth" => Ok(vec![StackValue::Amount(ctx.cache().len() as u128)]),
            "mint" => {
                ctx.mint(call.address(0)?, call.amount(1)?)?;
                Ok(vec![])
            }
            "spend" => {
                ctx.spend_value(sink(), call.amount(0)?)?;
                Ok(vec![])
            }
            "note" => {
                self.notes.lock().unwrap().push((ctx.step(), call.amount(0)?));
                Ok(vec![])
            }
            _ => Err(HandlerError::Failed("scripted failure".into())),
        }
    }
}

pub fn to_step(op: &Op) -> BatchStep {
    let (selector, args, value) = match op {
        Op::Push(amount) => ("push", vec![Argument::amount(*amount)], None),
        Op::Mint(index, amount) => (
            "mint",
            vec![
                Argument::address(tokens()[usize::from(*index) % 3]),
                Argument::amount(*amount),
            ],
            None,
        ),
        Op::Spend(amount) => ("spend", vec![Argument::amount(*amount)], Some(*amount)),
        Op::Note(tag) => ("note", vec![Argument::amount(*tag)], None),
        Op::Fail => ("fail", vec![], None),
    };
    let payload = args
        .into_iter()
        .fold(Payload::new(selector), |payload, arg| payload.arg(arg));
    BatchStep {
        handler: script_id(),
        payload,
        value,
    }
}

pub struct Harness {
    pub registry: Arc<Registry>,
    pub cap: AdminCap,
    pub script: Arc<ScriptHandler>,
    pub ledger: Ledger,
    pub caller: Address,
    pub proxy: Proxy,
}

impl Harness {
    pub fn new(config: KernelConfig) -> Self {
        let (registry, cap) = Registry::new();
        let script = Arc::new(ScriptHandler::default());
        registry
            .register(&cap, script_id(), ModuleRef::deploy(script.clone()))
            .unwrap();
        let registry = Arc::new(registry);

        let caller = Address::from_label("caller");
        let mut ledger = Ledger::new();
        ledger.mint(caller, Asset::Native, STARTING_NATIVE).unwrap();
        let proxy = Proxy::new(caller, registry.clone(), config);
        Self {
            registry,
            cap,
            script,
            ledger,
            caller,
            proxy,
        }
    }
}

/// Any step that does not fail by itself
pub fn succeeding_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u128..1_000).prop_map(Op::Push),
        (any::<u8>(), 1u128..1_000).prop_map(|(index, amount)| Op::Mint(index, amount)),
        (0u128..1_000).prop_map(Op::Spend),
        (0u128..1_000).prop_map(Op::Note),
    ]
}
