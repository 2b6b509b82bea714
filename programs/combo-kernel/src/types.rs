// Primitive value types shared by every layer of the kernel
//
// Addresses name ledger accounts (callers, proxies, handler modules, external
// venues). Handler identifiers name one handler interface version inside a
// registry. Stack values are the typed frames that flow between batch steps
// through the per-batch cache.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::errors::KernelError;

// ================================
// Addresses
// ================================

/// 32-byte account address on the ledger
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The all-zero address. Used by handlers as the native asset marker.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Derive a deterministic address from a seed
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Derive an address from a human readable label
    pub fn from_label(label: &str) -> Self {
        Self::derive(label.as_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

// ================================
// Assets
// ================================

/// An asset whose balances the ledger tracks
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum Asset {
    /// The ledger's native currency
    Native,
    /// A token identified by its contract address
    Token(Address),
}

impl Asset {
    /// Map the zero address to the native asset, anything else to a token
    pub fn from_address(address: Address) -> Self {
        if address.is_zero() {
            Self::Native
        } else {
            Self::Token(address)
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(address) => write!(f, "token:{address}"),
        }
    }
}

// ================================
// Handler Identifiers
// ================================

/// Width of a handler identifier in bytes
pub const HANDLER_ID_LEN: usize = 32;

/// Fixed-width identifier naming one handler interface version
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct HandlerId(pub [u8; HANDLER_ID_LEN]);

impl HandlerId {
    /// Build an identifier from a short ASCII name, zero padded.
    ///
    /// The name must be non-empty and at most 31 bytes so the identifier
    /// always carries a terminating zero byte.
    pub fn from_name(name: &str) -> Result<Self, KernelError> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() >= HANDLER_ID_LEN || bytes.contains(&0) {
            return Err(KernelError::InvalidIdentifier(name.to_string()));
        }
        let mut id = [0u8; HANDLER_ID_LEN];
        id[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub const fn from_bytes(bytes: [u8; HANDLER_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HANDLER_ID_LEN] {
        &self.0
    }

    /// The name this identifier was built from, if it is printable ASCII
    pub fn name(&self) -> Option<&str> {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(HANDLER_ID_LEN);
        let head = &self.0[..end];
        let tail_clean = self.0[end..].iter().all(|b| *b == 0);
        if end == 0 || !tail_clean || !head.iter().all(u8::is_ascii_graphic) {
            return None;
        }
        std::str::from_utf8(head).ok()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({self})")
    }
}

// ================================
// Stack Values
// ================================

/// Discriminant of a [`StackValue`], used in handler output contracts
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ValueKind {
    Amount,
    Address,
    Bool,
    Bytes,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Amount => "amount",
            Self::Address => "address",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A typed value passed between steps of one batch
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum StackValue {
    Amount(u128),
    Address(Address),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl StackValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Amount(_) => ValueKind::Amount,
            Self::Address(_) => ValueKind::Address,
            Self::Bool(_) => ValueKind::Bool,
            Self::Bytes(_) => ValueKind::Bytes,
        }
    }

    pub fn as_amount(&self) -> Option<u128> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<u128> for StackValue {
    fn from(amount: u128) -> Self {
        Self::Amount(amount)
    }
}

impl From<Address> for StackValue {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<bool> for StackValue {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<Vec<u8>> for StackValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}
