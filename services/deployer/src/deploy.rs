//! Handler deployment and proxy construction
//!
//! Registers the bundled handlers under their well-known identifiers and
//! records where each module lives, the same way a deployment script writes
//! its address book after every run. Venue accounts the handlers pay out of
//! (exchanges, the wrapped-native reserve) approve the deployed modules with
//! `approve_venues`.

use std::collections::BTreeMap;
use std::sync::Arc;

use combo_handlers::{funds, uniswap, wrapped, ExchangeDirectory, HFunds, HUniswap, HWrappedNative};
use combo_kernel::{
    Address, AdminCap, FeeRuleRegistry, Handler, HandlerId, KernelConfig, KernelError, Ledger,
    ModuleRef, Proxy, Registry,
};
use serde::{Serialize, Serializer};
use tracing::info;

/// Construction parameters for the bundled handlers
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    pub exchanges: ExchangeDirectory,
    pub wrapped_token: Address,
    pub wrapped_reserve: Address,
}

/// Name to address mapping produced by a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<String, Address>,
}

impl AddressBook {
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.entries.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AddressBook {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.entries
                .iter()
                .map(|(name, address)| (name, format!("0x{}", hex::encode(address.to_bytes())))),
        )
    }
}

/// Register every bundled handler in `registry`
pub fn deploy(registry: &Registry, cap: &AdminCap, deployment: &Deployment) -> Result<AddressBook, KernelError> {
    let handlers: [Arc<dyn Handler>; 3] = [
        Arc::new(HFunds::new()),
        Arc::new(HUniswap::new(deployment.exchanges.clone())),
        Arc::new(HWrappedNative::new(deployment.wrapped_token, deployment.wrapped_reserve)),
    ];
    let names = [funds::HANDLER_NAME, uniswap::HANDLER_NAME, wrapped::HANDLER_NAME];

    let mut book = AddressBook::default();
    for (name, handler) in names.into_iter().zip(handlers) {
        let module = ModuleRef::deploy(handler);
        let address = module.address;
        registry.register(cap, HandlerId::from_name(name)?, module)?;
        info!(handler = name, %address, "Deployed handler");
        book.insert(name, address);
    }
    book.insert("WRAPPED_NATIVE_TOKEN", deployment.wrapped_token);
    Ok(book)
}

/// Grant the deployed modules unlimited allowances over their venue accounts
pub fn approve_venues(
    ledger: &mut Ledger,
    deployment: &Deployment,
    book: &AddressBook,
) -> Result<(), KernelError> {
    let module = |name: &str| -> Result<Address, KernelError> {
        let id = HandlerId::from_name(name)?;
        book.get(name).ok_or(KernelError::UnknownIdentifier(id))
    };
    deployment
        .exchanges
        .approve_module(ledger, module(uniswap::HANDLER_NAME)?);
    HWrappedNative::new(deployment.wrapped_token, deployment.wrapped_reserve)
        .approve_module(ledger, module(wrapped::HANDLER_NAME)?);
    Ok(())
}

// ================================
// Deployer
// ================================

/// Owns a registry, its admin capability and the optional fee rules
pub struct Deployer {
    registry: Arc<Registry>,
    cap: AdminCap,
    fee_rules: Option<Arc<FeeRuleRegistry>>,
    config: KernelConfig,
}

impl Deployer {
    pub fn new(config: KernelConfig) -> Self {
        let (registry, cap) = Registry::new();
        Self {
            registry: Arc::new(registry),
            cap,
            fee_rules: None,
            config,
        }
    }

    /// Charge `basis_fee_bps` on attached value, paid to `collector`
    pub fn with_fees(mut self, basis_fee_bps: u32, collector: Address) -> Result<Self, KernelError> {
        let fees = FeeRuleRegistry::new(&self.cap, basis_fee_bps, collector)?;
        self.fee_rules = Some(Arc::new(fees));
        Ok(self)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cap(&self) -> &AdminCap {
        &self.cap
    }

    pub fn fee_rules(&self) -> Option<&FeeRuleRegistry> {
        self.fee_rules.as_deref()
    }

    pub fn deploy(&self, deployment: &Deployment) -> Result<AddressBook, KernelError> {
        deploy(&self.registry, &self.cap, deployment)
    }

    /// One proxy per user, all bound to this deployer's registry
    pub fn build_proxy(&self, owner: Address) -> Proxy {
        let proxy = Proxy::new(owner, Arc::clone(&self.registry), self.config);
        match &self.fee_rules {
            Some(fees) => proxy.with_fee_rules(Arc::clone(fees)),
            None => proxy,
        }
    }
}
