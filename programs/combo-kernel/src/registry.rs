// Handler registry for combo-kernel batch authorization
//
// The registry is the authoritative map from handler identifier to handler
// module. The proxy consults it once per batch step, at invocation time, so a
// module that is deregistered stops being callable by the very next step that
// names it, without redeploying any proxy.
//
// SECURITY MODEL: every write requires the `AdminCap` issued when the registry
// was created. There is no ambient caller identity; whoever holds the
// capability administers the registry. Reads are open to everyone and never
// block on writers for more than one shard of the map.
//
// Mutations are also appended to a bounded event log. Once it holds
// `MAX_REGISTRY_EVENTS` entries the oldest are dropped; consumers that need
// the full history drain it with `drain_events`.
//
// Besides handler entries the registry carries two global switches taken over
// from the original system: a halt flag that stops every proxy bound to this
// registry, and a ban list of callers whose batches are refused.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{KernelError, Result};
use crate::handler::Handler;
use crate::types::{Address, HandlerId};

/// Capacity of the registry's event log
pub const MAX_REGISTRY_EVENTS: usize = 1024;

// ================================
// Admin Capability
// ================================

/// Credential authorizing writes to one registry (and the fee rules bound to it)
#[derive(Debug)]
pub struct AdminCap {
    key: Uuid,
}

impl AdminCap {
    fn issue() -> Self {
        Self { key: Uuid::new_v4() }
    }

    pub(crate) fn key(&self) -> Uuid {
        self.key
    }
}

// ================================
// Module References
// ================================

/// A deployed handler module: its address plus the code behind it
#[derive(Clone)]
pub struct ModuleRef {
    pub address: Address,
    pub handler: Arc<dyn Handler>,
}

impl ModuleRef {
    pub fn new(address: Address, handler: Arc<dyn Handler>) -> Self {
        Self { address, handler }
    }

    /// Reference a handler at the address derived from its name and version
    pub fn deploy(handler: Arc<dyn Handler>) -> Self {
        let seed = format!("module:{}:v{}", handler.name(), handler.version());
        Self {
            address: Address::derive(seed.as_bytes()),
            handler,
        }
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRef")
            .field("address", &self.address)
            .field("handler", &self.handler.name())
            .finish()
    }
}

struct RegistryEntry {
    module: ModuleRef,
    registered_at: DateTime<Utc>,
}

/// Public description of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub id: HandlerId,
    pub address: Address,
    pub name: &'static str,
    pub version: u16,
    pub registered_at: DateTime<Utc>,
}

// ================================
// Registry Events
// ================================

/// Observable record of every registry mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered {
        id: HandlerId,
        address: Address,
        at: DateTime<Utc>,
    },
    Deregistered {
        id: HandlerId,
        at: DateTime<Utc>,
    },
    Halted {
        at: DateTime<Utc>,
    },
    Unhalted {
        at: DateTime<Utc>,
    },
    CallerBanned {
        caller: Address,
        at: DateTime<Utc>,
    },
    CallerUnbanned {
        caller: Address,
        at: DateTime<Utc>,
    },
}

// ================================
// Registry
// ================================

pub struct Registry {
    admin: Uuid,
    entries: DashMap<HandlerId, RegistryEntry>,
    banned: DashSet<Address>,
    halted: AtomicBool,
    events: Mutex<VecDeque<RegistryEvent>>,
}

impl Registry {
    /// Create an empty registry and the capability that administers it
    pub fn new() -> (Self, AdminCap) {
        let cap = AdminCap::issue();
        let registry = Self {
            admin: cap.key(),
            entries: DashMap::new(),
            banned: DashSet::new(),
            halted: AtomicBool::new(false),
            events: Mutex::new(VecDeque::new()),
        };
        (registry, cap)
    }

    /// Whether `cap` administers this registry
    pub fn is_admin(&self, cap: &AdminCap) -> bool {
        cap.key() == self.admin
    }

    fn authorize(&self, cap: &AdminCap) -> Result<()> {
        if self.is_admin(cap) {
            Ok(())
        } else {
            warn!("Rejected registry write with foreign credential");
            Err(KernelError::Unauthorized)
        }
    }

    fn emit(&self, event: RegistryEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.len() == MAX_REGISTRY_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    // ===== Handler Entries =====

    /// Map `id` to `module`.
    ///
    /// Registering the same mapping again is a no-op; mapping an identifier
    /// that is already bound to a different module address is rejected.
    pub fn register(&self, cap: &AdminCap, id: HandlerId, module: ModuleRef) -> Result<()> {
        self.authorize(cap)?;
        let address = module.address;
        match self.entries.entry(id) {
            Entry::Occupied(existing) => {
                if existing.get().module.address == address {
                    return Ok(());
                }
                return Err(KernelError::DuplicateIdentifier(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(RegistryEntry {
                    module,
                    registered_at: Utc::now(),
                });
            }
        }
        info!(handler = %id, module = %address, "Registered handler");
        self.emit(RegistryEvent::Registered {
            id,
            address,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Remove the mapping for `id`
    pub fn deregister(&self, cap: &AdminCap, id: HandlerId) -> Result<()> {
        self.authorize(cap)?;
        self.entries
            .remove(&id)
            .ok_or(KernelError::UnknownIdentifier(id))?;
        info!(handler = %id, "Deregistered handler");
        self.emit(RegistryEvent::Deregistered { id, at: Utc::now() });
        Ok(())
    }

    pub fn is_registered(&self, id: &HandlerId) -> bool {
        self.entries.contains_key(id)
    }

    /// The handler currently bound to `id`
    pub fn resolve(&self, id: &HandlerId) -> Option<Arc<dyn Handler>> {
        self.entries
            .get(id)
            .map(|entry| Arc::clone(&entry.module.handler))
    }

    /// The module currently bound to `id`
    pub fn module(&self, id: &HandlerId) -> Option<ModuleRef> {
        self.entries.get(id).map(|entry| entry.module.clone())
    }

    /// Module address currently bound to `id`
    pub fn module_address(&self, id: &HandlerId) -> Option<Address> {
        self.entries.get(id).map(|entry| entry.module.address)
    }

    pub fn info(&self, id: &HandlerId) -> Option<HandlerInfo> {
        self.entries.get(id).map(|entry| HandlerInfo {
            id: *id,
            address: entry.module.address,
            name: entry.module.handler.name(),
            version: entry.module.handler.version(),
            registered_at: entry.registered_at,
        })
    }

    /// Every registered identifier, sorted
    pub fn handlers(&self) -> Vec<HandlerId> {
        let mut ids: Vec<HandlerId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ===== Global Switches =====

    /// Refuse every batch until `unhalt`
    pub fn halt(&self, cap: &AdminCap) -> Result<()> {
        self.authorize(cap)?;
        if !self.halted.swap(true, Ordering::SeqCst) {
            warn!("Registry halted");
            self.emit(RegistryEvent::Halted { at: Utc::now() });
        }
        Ok(())
    }

    pub fn unhalt(&self, cap: &AdminCap) -> Result<()> {
        self.authorize(cap)?;
        if self.halted.swap(false, Ordering::SeqCst) {
            info!("Registry unhalted");
            self.emit(RegistryEvent::Unhalted { at: Utc::now() });
        }
        Ok(())
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Refuse every batch submitted by `caller`
    pub fn ban(&self, cap: &AdminCap, caller: Address) -> Result<()> {
        self.authorize(cap)?;
        if self.banned.insert(caller) {
            info!(%caller, "Banned caller");
            self.emit(RegistryEvent::CallerBanned { caller, at: Utc::now() });
        }
        Ok(())
    }

    pub fn unban(&self, cap: &AdminCap, caller: Address) -> Result<()> {
        self.authorize(cap)?;
        if self.banned.remove(&caller).is_some() {
            info!(%caller, "Unbanned caller");
            self.emit(RegistryEvent::CallerUnbanned { caller, at: Utc::now() });
        }
        Ok(())
    }

    pub fn is_banned(&self, caller: &Address) -> bool {
        self.banned.contains(caller)
    }

    /// Retained events, oldest first
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Take every retained event, leaving the log empty
    pub fn drain_events(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}
