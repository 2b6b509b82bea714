// Shared fixtures for combo-kernel integration tests
//
// `ScriptHandler` exposes one selector per behavior the engine has to cope
// with (pushing values, reading the cache, spending value, pulling funds from
// another account, failing, breaking its output contract). `Recorder` logs the order it is invoked in.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use combo_kernel::{
    AdminCap, Address, Argument, Asset, BatchStep, HandlerError, HandlerId, InvocationContext,
    KernelConfig, Ledger, ModuleRef, Payload, Proxy, Registry, ResolvedCall, StackValue,
    ValueKind,
};

pub const SCRIPT: &str = "HScript";
pub const RECORDER: &str = "HRecorder";

// ================================
// Scripted Handlers
// ================================

pub struct ScriptHandler;

impl combo_kernel::Handler for ScriptHandler {
    fn name(&self) -> &'static str {
        "script"
    }

    fn outputs(&self, selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        match selector {
            "push" | "add" | "depth" | "take" | "lie" => Ok(&[ValueKind::Amount]),
            "push_two" => Ok(&[ValueKind::Amount, ValueKind::Amount]),
            "mint" | "spend" | "pay" | "pull" | "fail" => Ok(&[]),
            other => Err(HandlerError::UnknownSelector(other.to_string())),
        }
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        match call.selector.as_str() {
            "push" => Ok(vec![StackValue::Amount(call.amount(0)?)]),
            "push_two" => Ok(vec![
                StackValue::Amount(call.amount(0)?),
                StackValue::Amount(call.amount(1)?),
            ]),
            "add" => {
                let sum = call
                    .amount(0)?
                    .checked_add(call.amount(1)?)
                    .ok_or(HandlerError::Overflow)?;
                Ok(vec![StackValue::Amount(sum)])
            }
            "depth" => Ok(vec![StackValue::Amount(ctx.cache().len() as u128)]),
            "take" => {
                let value = ctx
                    .cache_mut()
                    .pop()
                    .map_err(|err| HandlerError::Failed(err.to_string()))?;
                Ok(vec![value])
            }
            "mint" => {
                ctx.mint(call.address(0)?, call.amount(1)?)?;
                Ok(vec![])
            }
            "spend" => {
                ctx.spend_value(call.address(0)?, call.amount(1)?)?;
                Ok(vec![])
            }
            "pay" => {
                let asset = Asset::from_address(call.address(0)?);
                ctx.pay(asset, call.address(1)?, call.amount(2)?)?;
                Ok(vec![])
            }
            "pull" => {
                let asset = Asset::from_address(call.address(0)?);
                ctx.receive(asset, call.address(1)?, call.amount(2)?)?;
                Ok(vec![])
            }
            "lie" => Ok(vec![]),
            _ => Err(HandlerError::Failed("scripted failure".into())),
        }
    }
}

/// Records `(step, tag)` for every invocation
#[derive(Default)]
pub struct Recorder {
    pub log: Mutex<Vec<(usize, u128)>>,
}

impl Recorder {
    pub fn entries(&self) -> Vec<(usize, u128)> {
        self.log.lock().unwrap().clone()
    }
}

impl combo_kernel::Handler for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn outputs(&self, _selector: &str) -> Result<&'static [ValueKind], HandlerError> {
        Ok(&[])
    }

    fn invoke(
        &self,
        ctx: &mut InvocationContext<'_>,
        call: &ResolvedCall,
    ) -> Result<Vec<StackValue>, HandlerError> {
        self.log.lock().unwrap().push((ctx.step(), call.amount(0)?));
        Ok(vec![])
    }
}

// ================================
// Harness
// ================================

pub struct Harness {
    pub registry: Arc<Registry>,
    pub cap: AdminCap,
    pub recorder: Arc<Recorder>,
    pub ledger: Ledger,
    pub alice: Address,
    pub proxy: Proxy,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let (registry, cap) = Registry::new();
        let recorder = Arc::new(Recorder::default());
        registry
            .register(&cap, script_id(), ModuleRef::deploy(Arc::new(ScriptHandler)))
            .unwrap();
        registry
            .register(&cap, recorder_id(), ModuleRef::deploy(recorder.clone()))
            .unwrap();

        let registry = Arc::new(registry);
        let alice = Address::from_label("alice");
        let mut ledger = Ledger::new();
        ledger.mint(alice, Asset::Native, 1_000).unwrap();
        let proxy = Proxy::new(alice, registry.clone(), config);
        Self {
            registry,
            cap,
            recorder,
            ledger,
            alice,
            proxy,
        }
    }
}

pub fn script_id() -> HandlerId {
    HandlerId::from_name(SCRIPT).unwrap()
}

pub fn recorder_id() -> HandlerId {
    HandlerId::from_name(RECORDER).unwrap()
}

pub fn script(selector: &str, args: Vec<Argument>) -> BatchStep {
    let payload = args
        .into_iter()
        .fold(Payload::new(selector), |payload, arg| payload.arg(arg));
    BatchStep::new(script_id(), payload)
}

pub fn push(amount: u128) -> BatchStep {
    script("push", vec![Argument::amount(amount)])
}

pub fn mint(token: Address, amount: u128) -> BatchStep {
    script("mint", vec![Argument::address(token), Argument::amount(amount)])
}

pub fn fail() -> BatchStep {
    script("fail", vec![])
}

pub fn note(tag: u128) -> BatchStep {
    note_arg(Argument::amount(tag))
}

/// Record whatever `argument` resolves to
pub fn note_arg(argument: Argument) -> BatchStep {
    BatchStep::new(recorder_id(), Payload::new("note").arg(argument))
}

/// Pull `amount` of `asset` (zero address for native) out of `from`
pub fn pull(asset: Address, from: Address, amount: u128) -> BatchStep {
    script(
        "pull",
        vec![Argument::address(asset), Argument::address(from), Argument::amount(amount)],
    )
}
