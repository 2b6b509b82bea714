use std::collections::HashMap;
use std::sync::Arc;

use combo_kernel::{
    Address, Batch, BatchStep, HandlerId, KernelConfig, KernelError, Ledger, ModuleRef, Payload,
    Proxy, Registry,
};
use proptest::prelude::*;

#[path = "common/mod.rs"]
mod common;
use common::*;

#[derive(Debug, Clone)]
enum RegistryOp {
    Register { id: usize, module: usize },
    Deregister { id: usize },
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        (0usize..6, 0usize..3).prop_map(|(id, module)| RegistryOp::Register { id, module }),
        (0usize..6).prop_map(|id| RegistryOp::Deregister { id }),
    ]
}

fn handler_id(index: usize) -> HandlerId {
    HandlerId::from_name(&format!("HProp{index}")).unwrap()
}

fn module(index: usize, script: &Arc<ScriptHandler>) -> ModuleRef {
    ModuleRef::new(Address::from_label(&format!("module-{index}")), script.clone())
}

/// Property: the registry behaves like a map that refuses to rebind identifiers
#[test]
fn prop_registry_matches_model() {
    proptest!(|(ops in prop::collection::vec(registry_op(), 1..64))| {
        let (registry, cap) = Registry::new();
        let script = Arc::new(ScriptHandler::default());
        let mut model: HashMap<usize, usize> = HashMap::new();

        for op in ops {
            match op {
                RegistryOp::Register { id, module: m } => {
                    let result = registry.register(&cap, handler_id(id), module(m, &script));
                    match model.get(&id) {
                        Some(bound) if *bound != m => {
                            prop_assert_eq!(result, Err(KernelError::DuplicateIdentifier(handler_id(id))));
                        }
                        _ => {
                            prop_assert_eq!(result, Ok(()));
                            model.insert(id, m);
                        }
                    }
                }
                RegistryOp::Deregister { id } => {
                    let result = registry.deregister(&cap, handler_id(id));
                    if model.remove(&id).is_some() {
                        prop_assert_eq!(result, Ok(()));
                    } else {
                        prop_assert_eq!(result, Err(KernelError::UnknownIdentifier(handler_id(id))));
                    }
                }
            }
        }

        prop_assert_eq!(registry.len(), model.len());
        for id in 0..6 {
            let expected = model
                .get(&id)
                .map(|m| Address::from_label(&format!("module-{m}")));
            prop_assert_eq!(registry.module_address(&handler_id(id)), expected);
        }
    });
}

/// Property: writes with a credential from another registry change nothing
#[test]
fn prop_foreign_credential_is_rejected() {
    proptest!(|(ops in prop::collection::vec(registry_op(), 1..32))| {
        let (registry, cap) = Registry::new();
        let (_, foreign) = Registry::new();
        let script = Arc::new(ScriptHandler::default());
        registry.register(&cap, handler_id(0), module(0, &script)).unwrap();
        let events = registry.events().len();

        for op in ops {
            let result = match op {
                RegistryOp::Register { id, module: m } => {
                    registry.register(&foreign, handler_id(id), module(m, &script))
                }
                RegistryOp::Deregister { id } => registry.deregister(&foreign, handler_id(id)),
            };
            prop_assert_eq!(result, Err(KernelError::Unauthorized));
        }

        prop_assert_eq!(registry.handlers(), vec![handler_id(0)]);
        prop_assert_eq!(registry.events().len(), events);
        prop_assert!(registry.halt(&foreign).is_err());
        prop_assert!(!registry.is_halted());
    });
}

/// Property: a proxy dispatches exactly the identifiers currently registered
#[test]
fn prop_dispatch_follows_current_registrations() {
    proptest!(|(ops in prop::collection::vec(registry_op(), 1..32), probe in 0usize..6)| {
        let (registry, cap) = Registry::new();
        let script = Arc::new(ScriptHandler::default());
        for op in ops {
            // Outcomes are covered by the model test
            let _ = match op {
                RegistryOp::Register { id, module: m } => {
                    registry.register(&cap, handler_id(id), module(m, &script))
                }
                RegistryOp::Deregister { id } => registry.deregister(&cap, handler_id(id)),
            };
        }

        let registered = registry.is_registered(&handler_id(probe));
        let proxy = Proxy::new(Address::from_label("caller"), Arc::new(registry), KernelConfig::default());
        let mut ledger = Ledger::new();
        let batch = Batch::new(vec![BatchStep::new(handler_id(probe), Payload::new("depth"))]);

        let result = proxy.execute(&mut ledger, &batch);
        prop_assert_eq!(result.is_success(), registered);
        if !registered {
            let failure = result.failure.unwrap();
            prop_assert_eq!(failure.error, KernelError::HandlerNotRegistered(handler_id(probe)));
        }
    });
}
