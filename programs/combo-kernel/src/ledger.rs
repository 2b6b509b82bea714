// Journaled ledger substrate
//
// The kernel assumes an execution substrate that offers atomic transactions:
// every write made between a checkpoint and its revert is undone, in reverse
// order, and nothing leaks. The ledger records the previous value of every
// balance and allowance slot it overwrites while a checkpoint is open, which
// is enough to restore the exact pre-checkpoint state.
//
// Checkpoints nest. Reverting an inner checkpoint only undoes the writes made
// after it; the journal is discarded once the outermost checkpoint commits.

use std::collections::{BTreeMap, HashMap};

use crate::errors::LedgerError;
use crate::types::{Address, Asset};

// ================================
// Journal
// ================================

type AllowanceKey = (Address, Address, Asset);

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        account: Address,
        asset: Asset,
        previous: Option<u128>,
    },
    Allowance {
        key: AllowanceKey,
        previous: Option<u128>,
    },
}

/// Handle to an open ledger transaction
#[must_use = "a checkpoint must be committed or reverted"]
#[derive(Debug)]
pub struct Checkpoint {
    journal_len: usize,
    depth: usize,
}

impl Checkpoint {
    pub fn depth(&self) -> usize {
        self.depth
    }
}

// ================================
// Ledger
// ================================

/// Balances and allowances of every account known to the substrate
#[derive(Debug, Default)]
pub struct Ledger {
    balances: HashMap<(Address, Asset), u128>,
    allowances: HashMap<AllowanceKey, u128>,
    journal: Vec<JournalEntry>,
    depth: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Transactions =====

    /// Open a (possibly nested) transaction
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            journal_len: self.journal.len(),
            depth: self.depth,
        }
    }

    /// Keep every write made since `checkpoint`
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        self.depth = checkpoint.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    /// Undo every write made since `checkpoint`
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.journal_len {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Balance { account, asset, previous } => {
                    restore(&mut self.balances, (account, asset), previous);
                }
                JournalEntry::Allowance { key, previous } => {
                    restore(&mut self.allowances, key, previous);
                }
            }
        }
        self.depth = checkpoint.depth.saturating_sub(1);
    }

    /// Whether a checkpoint is currently open
    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    // ===== Balances =====

    pub fn balance_of(&self, account: Address, asset: Asset) -> u128 {
        self.balances.get(&(account, asset)).copied().unwrap_or(0)
    }

    /// Create `amount` of `asset` out of thin air. Used for genesis and tests.
    pub fn mint(&mut self, account: Address, asset: Asset, amount: u128) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(account, asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.set_balance(account, asset, balance);
        Ok(())
    }

    /// Destroy `amount` of `asset` held by `account`
    pub fn burn(&mut self, account: Address, asset: Asset, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(account, asset);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account,
                asset,
                required: amount,
                available,
            })?;
        self.set_balance(account, asset, remaining);
        Ok(())
    }

    /// Move `amount` of `asset` from `from` to `to`
    pub fn transfer(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            // Still reject transfers the sender could not have covered
            let available = self.balance_of(from, asset);
            if available < amount {
                return Err(LedgerError::InsufficientBalance {
                    account: from,
                    asset,
                    required: amount,
                    available,
                });
            }
            return Ok(());
        }
        let credited = self
            .balance_of(to, asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.burn(from, asset, amount)?;
        self.set_balance(to, asset, credited);
        Ok(())
    }

    // ===== Allowances =====

    pub fn allowance(&self, owner: Address, spender: Address, asset: Asset) -> u128 {
        self.allowances
            .get(&(owner, spender, asset))
            .copied()
            .unwrap_or(0)
    }

    /// Let `spender` move up to `amount` of `asset` out of `owner`'s balance
    pub fn approve(&mut self, owner: Address, spender: Address, asset: Asset, amount: u128) {
        let key = (owner, spender, asset);
        let previous = self.allowances.insert(key, amount);
        if self.in_transaction() {
            self.journal.push(JournalEntry::Allowance { key, previous });
        }
    }

    /// Move `asset` owned by `owner` on behalf of `spender`, consuming allowance.
    ///
    /// An allowance of `u128::MAX` is unlimited and never decreases.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        asset: Asset,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let available = self.allowance(owner, spender, asset);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientAllowance {
                owner,
                spender,
                asset,
                required: amount,
                available,
            })?;
        self.transfer(asset, owner, to, amount)?;
        if available != u128::MAX {
            self.approve(owner, spender, asset, remaining);
        }
        Ok(())
    }

    // ===== Inspection =====

    /// Every non-zero balance of `account`
    pub fn holdings(&self, account: Address) -> BTreeMap<Asset, u128> {
        self.balances
            .iter()
            .filter(|((holder, _), amount)| *holder == account && **amount > 0)
            .map(|((_, asset), amount)| (*asset, *amount))
            .collect()
    }

    /// Every non-zero balance on the ledger, ordered
    pub fn snapshot(&self) -> BTreeMap<(Address, Asset), u128> {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(key, amount)| (*key, *amount))
            .collect()
    }

    fn set_balance(&mut self, account: Address, asset: Asset, amount: u128) {
        let previous = self.balances.insert((account, asset), amount);
        if self.in_transaction() {
            self.journal.push(JournalEntry::Balance {
                account,
                asset,
                previous,
            });
        }
    }
}

fn restore<K: std::hash::Hash + Eq>(map: &mut HashMap<K, u128>, key: K, previous: Option<u128>) {
    match previous {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}
