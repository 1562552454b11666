//! # Asset Ledger
//!
//! The fungible-balance primitive a vault keeps its underlying asset in.
//! It is intentionally plain: balances, allowances, mint, burn, transfer.
//! Everything interesting happens in the vault that sits on top of it.
//!
//! ## Sharing
//!
//! The vault, its strategies and its accountant all move the same asset, so
//! the ledger is shared as [`SharedLedger`] (`Arc<RwLock<AssetLedger>>`).
//! Callers must release their guard before invoking a collaborator, since
//! collaborators take the lock themselves. The vault snapshots the ledger
//! by cloning it, which is what makes a failed vault call roll back every
//! asset movement it caused.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::address::Address;

/// Shared handle to an asset ledger.
pub type SharedLedger = Arc<RwLock<AssetLedger>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from asset ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The sender does not hold enough of the asset.
    #[error("insufficient balance: {account} holds {available}, needs {needed}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Amount requested.
        needed: u128,
        /// Amount held.
        available: u128,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: {spender} may move {available} of {owner}'s balance, needs {needed}")]
    InsufficientAllowance {
        /// Account whose balance is being moved.
        owner: Address,
        /// Account moving it.
        spender: Address,
        /// Amount requested.
        needed: u128,
        /// Remaining allowance.
        available: u128,
    },

    /// Transfers to or mints for the zero address are rejected.
    #[error("asset ledger refuses the zero address")]
    ZeroAddress,

    /// Supply or a balance would overflow `u128`.
    #[error("asset ledger overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Balances and allowances of a single fungible asset.
#[derive(Debug, Clone)]
pub struct AssetLedger {
    address: Address,
    symbol: String,
    decimals: u8,
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl AssetLedger {
    /// Creates an empty ledger for an asset identified by `symbol`.
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        let symbol = symbol.into();
        Self {
            address: Address::derive(&[b"asset", symbol.as_bytes(), &[decimals]]),
            symbol,
            decimals,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Wraps the ledger in the shared handle vaults expect.
    pub fn shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    /// The asset's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The asset's ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Decimal places of one whole unit.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Circulating supply.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of `account`.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Creates `amount` new units for `to`.
    pub fn mint(&mut self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Destroys `amount` units held by `from`.
    pub fn burn(&mut self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        self.debit(from, amount)?;
        // Supply always covers any single balance.
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.debit(from, amount)?;
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Sets the allowance of `spender` over `owner`'s balance.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), amount);
        }
    }

    /// Moves `amount` from `owner` to `to` on behalf of `spender`, consuming
    /// allowance. An allowance of `u128::MAX` is treated as unlimited.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                needed: amount,
                available: allowance,
            });
        }
        self.transfer(owner, to, amount)?;
        if allowance != u128::MAX {
            self.approve(owner, spender, allowance - amount);
        }
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                needed: amount,
                available,
            });
        }
        if available == amount {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, available - amount);
        }
        Ok(())
    }
}
