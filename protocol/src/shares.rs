//! # Share Ledger
//!
//! Vault shares: balances, allowances and total supply, plus the pure
//! share/asset conversion at a given price. The ledger knows nothing about
//! strategies or profit locking; the vault feeds it the totals to convert
//! against.
//!
//! The vault's own address is an ordinary holder here. Shares it holds are
//! the profit buffer, and the unlock engine decides how much of that
//! balance still counts.

use std::collections::HashMap;

use crate::address::Address;
use crate::error::VaultError;
use crate::math::{self, mul_div, Rounding};

/// Fungible share balances of one vault.
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl ShareLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored supply, including any locked profit buffer.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Stored balance of `owner`.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Remaining shares `spender` may move on behalf of `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Issues `shares` to `to`.
    pub fn mint(&mut self, to: &Address, shares: u128) -> Result<(), VaultError> {
        self.total_supply = math::add(self.total_supply, shares, "share supply")?;
        let balance = self.balance_of(to);
        self.balances
            .insert(*to, math::add(balance, shares, "share balance")?);
        Ok(())
    }

    /// Destroys `shares` held by `from`.
    pub fn burn(&mut self, from: &Address, shares: u128) -> Result<(), VaultError> {
        self.debit(from, shares)?;
        self.total_supply = math::sub(self.total_supply, shares, "share supply")?;
        Ok(())
    }

    /// Moves `shares` between holders.
    pub fn transfer(&mut self, from: &Address, to: &Address, shares: u128) -> Result<(), VaultError> {
        self.debit(from, shares)?;
        let balance = self.balance_of(to);
        self.balances
            .insert(*to, math::add(balance, shares, "share balance")?);
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: &Address, spender: &Address, shares: u128) {
        if shares == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), shares);
        }
    }

    /// Consumes `shares` of allowance. `u128::MAX` never decreases.
    pub fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: u128,
    ) -> Result<(), VaultError> {
        let current = self.allowance(owner, spender);
        if current == u128::MAX {
            return Ok(());
        }
        if current < shares {
            return Err(VaultError::InsufficientAllowance);
        }
        self.approve(owner, spender, current - shares);
        Ok(())
    }

    fn debit(&mut self, owner: &Address, shares: u128) -> Result<(), VaultError> {
        let balance = self.balance_of(owner);
        if balance < shares {
            return Err(VaultError::InsufficientShareBalance);
        }
        if balance == shares {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, balance - shares);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    /// Shares worth `assets` at a price of `total_assets / total_supply`.
    ///
    /// An empty supply prices shares 1:1. A non-empty supply backed by zero
    /// assets prices shares at zero, so nothing can be bought with assets.
    pub fn shares_for_assets(
        assets: u128,
        total_assets: u128,
        total_supply: u128,
        rounding: Rounding,
    ) -> Result<u128, VaultError> {
        if assets == 0 || assets == u128::MAX {
            return Ok(assets);
        }
        if total_assets == 0 {
            return Ok(if total_supply == 0 { assets } else { 0 });
        }
        mul_div(assets, total_supply, total_assets, rounding)
    }

    /// Assets redeemable for `shares` at a price of
    /// `total_assets / total_supply`.
    pub fn assets_for_shares(
        shares: u128,
        total_assets: u128,
        total_supply: u128,
        rounding: Rounding,
    ) -> Result<u128, VaultError> {
        if shares == 0 || shares == u128::MAX {
            return Ok(shares);
        }
        if total_supply == 0 {
            return Ok(shares);
        }
        mul_div(shares, total_assets, total_supply, rounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn mint_burn_keep_supply_consistent() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&alice(), 100).unwrap();
        ledger.mint(&bob(), 50).unwrap();
        ledger.burn(&alice(), 30).unwrap();
        assert_eq!(ledger.total_supply(), 120);
        assert_eq!(ledger.balance_of(&alice()), 70);
    }

    #[test]
    fn burn_more_than_held_fails() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&alice(), 10).unwrap();
        assert!(matches!(
            ledger.burn(&alice(), 11),
            Err(VaultError::InsufficientShareBalance)
        ));
        assert_eq!(ledger.total_supply(), 10);
    }

    #[test]
    fn allowance_is_consumed() {
        let mut ledger = ShareLedger::new();
        ledger.approve(&alice(), &bob(), 10);
        ledger.spend_allowance(&alice(), &bob(), 4).unwrap();
        assert_eq!(ledger.allowance(&alice(), &bob()), 6);
        assert!(matches!(
            ledger.spend_allowance(&alice(), &bob(), 7),
            Err(VaultError::InsufficientAllowance)
        ));
    }

    #[test]
    fn conversion_is_one_to_one_on_empty_supply() {
        assert_eq!(
            ShareLedger::shares_for_assets(500, 0, 0, Rounding::Down).unwrap(),
            500
        );
        assert_eq!(
            ShareLedger::assets_for_shares(500, 123, 0, Rounding::Down).unwrap(),
            500
        );
    }

    #[test]
    fn conversion_prices_at_zero_when_assets_are_gone() {
        assert_eq!(
            ShareLedger::shares_for_assets(500, 0, 1_000, Rounding::Down).unwrap(),
            0
        );
    }

    #[test]
    fn conversion_rounds_as_asked() {
        // 750 assets backing 1000 shares: price 0.75.
        assert_eq!(
            ShareLedger::assets_for_shares(1, 750, 1_000, Rounding::Down).unwrap(),
            0
        );
        assert_eq!(
            ShareLedger::assets_for_shares(1, 750, 1_000, Rounding::Up).unwrap(),
            1
        );
        assert_eq!(
            ShareLedger::shares_for_assets(750, 750, 1_000, Rounding::Down).unwrap(),
            1_000
        );
    }
}
