// Shared market fixture for handler integration tests

#![allow(dead_code)]

use std::sync::Arc;

use combo_handlers::{funds, uniswap, wrapped, ExchangeDirectory, HFunds, HUniswap, HWrappedNative};
use combo_kernel::{
    AdminCap, Address, Argument, Asset, BatchStep, HandlerId, KernelConfig, Ledger, ModuleRef,
    Payload, Proxy, Registry,
};

pub const DAI_NATIVE_RESERVE: u128 = 1_000_000;
pub const DAI_TOKEN_RESERVE: u128 = 200_000_000;
pub const USDC_NATIVE_RESERVE: u128 = 500_000;
pub const USDC_TOKEN_RESERVE: u128 = 100_000_000;

pub struct Market {
    pub registry: Arc<Registry>,
    pub cap: AdminCap,
    pub ledger: Ledger,
    pub alice: Address,
    pub proxy: Proxy,
    pub dai: Address,
    pub usdc: Address,
    pub dai_exchange: Address,
    pub usdc_exchange: Address,
    pub weth: Address,
    pub weth_reserve: Address,
}

impl Market {
    pub fn new() -> Self {
        let dai = Address::from_label("dai");
        let usdc = Address::from_label("usdc");
        let dai_exchange = Address::from_label("dai-exchange");
        let usdc_exchange = Address::from_label("usdc-exchange");
        let weth = Address::from_label("weth");
        let weth_reserve = Address::from_label("weth-reserve");

        let directory = ExchangeDirectory::new()
            .with_exchange(dai, dai_exchange)
            .with_exchange(usdc, usdc_exchange);

        let wrapper = HWrappedNative::new(weth, weth_reserve);
        let exchange_module = ModuleRef::deploy(Arc::new(HUniswap::new(directory.clone())));
        let wrapper_module = ModuleRef::deploy(Arc::new(wrapper));

        let mut ledger = Ledger::new();
        directory.approve_module(&mut ledger, exchange_module.address);
        wrapper.approve_module(&mut ledger, wrapper_module.address);

        let (registry, cap) = Registry::new();
        registry
            .register(&cap, id(funds::HANDLER_NAME), ModuleRef::deploy(Arc::new(HFunds::new())))
            .unwrap();
        registry
            .register(&cap, id(uniswap::HANDLER_NAME), exchange_module)
            .unwrap();
        registry
            .register(&cap, id(wrapped::HANDLER_NAME), wrapper_module)
            .unwrap();

        let alice = Address::from_label("alice");
        ledger.mint(alice, Asset::Native, 10_000).unwrap();
        ledger.mint(dai_exchange, Asset::Native, DAI_NATIVE_RESERVE).unwrap();
        ledger.mint(dai_exchange, Asset::Token(dai), DAI_TOKEN_RESERVE).unwrap();
        ledger.mint(usdc_exchange, Asset::Native, USDC_NATIVE_RESERVE).unwrap();
        ledger.mint(usdc_exchange, Asset::Token(usdc), USDC_TOKEN_RESERVE).unwrap();

        let registry = Arc::new(registry);
        let proxy = Proxy::new(alice, registry.clone(), KernelConfig::default());
        Self {
            registry,
            cap,
            ledger,
            alice,
            proxy,
            dai,
            usdc,
            dai_exchange,
            usdc_exchange,
            weth,
            weth_reserve,
        }
    }

    pub fn balance(&self, asset: Asset) -> u128 {
        self.ledger.balance_of(self.alice, asset)
    }
}

pub fn id(name: &str) -> HandlerId {
    HandlerId::from_name(name).unwrap()
}

pub fn step(handler: &str, selector: &str, args: Vec<Argument>) -> BatchStep {
    let payload = args
        .into_iter()
        .fold(Payload::new(selector), |payload, arg| payload.arg(arg));
    BatchStep::new(id(handler), payload)
}
