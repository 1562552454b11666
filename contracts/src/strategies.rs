//! # Reference Strategy
//!
//! [`MockStrategy`] holds its funds on the shared asset ledger and pools
//! every depositor into one position. Positions sold off through
//! `transfer_position` are carved out of the pool as fixed asset claims.
//!
//! Its behavior can be bent to reproduce the ways a real strategy goes
//! wrong:
//!
//! - a capacity cap (`set_max_debt`), beyond which it refuses deposits;
//! - locked funds (`set_locked_funds`) that cannot be withdrawn;
//! - partial absorption (`set_deposit_ratio_bps`) of what it is offered;
//! - lossy withdrawals (`set_withdraw_shortfall`), where part of the
//!   requested amount is lost on the way out;
//! - generous withdrawals (`set_withdraw_surplus`), paying out more than
//!   asked;
//! - unrealised gains and losses (`simulate_gain`, `simulate_loss`).
//!
//! Knobs and claims live outside the ledger and are not rolled back when a
//! vault call reverts.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use strata_protocol::config::MAX_BPS;
use strata_protocol::error::ExternalError;
use strata_protocol::ledger::{LedgerError, SharedLedger};
use strata_protocol::math::{mul_div, Rounding};
use strata_protocol::{Address, Strategy};
use tracing::debug;

#[derive(Debug)]
struct MockState {
    max_debt: u128,
    locked: u128,
    deposit_ratio_bps: u16,
    withdraw_shortfall: u128,
    withdraw_surplus: u128,
    depositors: HashSet<Address>,
    claims: HashMap<Address, u128>,
}

impl MockState {
    fn claimed(&self) -> u128 {
        self.claims.values().fold(0u128, |acc, c| acc.saturating_add(*c))
    }
}

/// A strategy for tests and simulations.
#[derive(Debug)]
pub struct MockStrategy {
    address: Address,
    asset: Address,
    ledger: SharedLedger,
    state: Mutex<MockState>,
}

impl MockStrategy {
    /// Creates a well-behaved strategy for the ledger's asset, named by
    /// `label`.
    pub fn new(label: &str, ledger: &SharedLedger) -> Self {
        let asset = ledger.read().address();
        Self {
            address: Address::from_label(label),
            asset,
            ledger: ledger.clone(),
            state: Mutex::new(MockState {
                max_debt: u128::MAX,
                locked: 0,
                deposit_ratio_bps: MAX_BPS as u16,
                withdraw_shortfall: 0,
                withdraw_surplus: 0,
                depositors: HashSet::new(),
                claims: HashMap::new(),
            }),
        }
    }

    /// Like [`MockStrategy::new`] but for an arbitrary asset address, which
    /// the vault will refuse.
    pub fn with_asset(label: &str, ledger: &SharedLedger, asset: Address) -> Self {
        let mut strategy = Self::new(label, ledger);
        strategy.asset = asset;
        strategy
    }

    // -----------------------------------------------------------------------
    // Knobs
    // -----------------------------------------------------------------------

    /// Caps the strategy's total holdings.
    pub fn set_max_debt(&self, max_debt: u128) {
        self.state.lock().max_debt = max_debt;
    }

    /// Makes `locked` of the holdings unwithdrawable.
    pub fn set_locked_funds(&self, locked: u128) {
        self.state.lock().locked = locked;
    }

    /// Absorbs only `bps` of every deposit offered.
    pub fn set_deposit_ratio_bps(&self, bps: u16) {
        self.state.lock().deposit_ratio_bps = bps;
    }

    /// Loses `amount` on every withdrawal.
    pub fn set_withdraw_shortfall(&self, amount: u128) {
        self.state.lock().withdraw_shortfall = amount;
    }

    /// Pays `amount` extra on every withdrawal, while it has the funds.
    pub fn set_withdraw_surplus(&self, amount: u128) {
        self.state.lock().withdraw_surplus = amount;
    }

    /// Yield arrives: mints `amount` of the asset into the strategy.
    pub fn simulate_gain(&self, amount: u128) -> Result<(), LedgerError> {
        self.ledger.write().mint(&self.address, amount)
    }

    /// Funds vanish: burns `amount` of the strategy's holdings.
    pub fn simulate_loss(&self, amount: u128) -> Result<(), LedgerError> {
        self.ledger.write().burn(&self.address, amount)
    }

    fn balance(&self) -> u128 {
        self.ledger.read().balance_of(&self.address)
    }

    fn revert(&self, reason: &str) -> ExternalError {
        ExternalError::reverted(self.address, reason)
    }
}

impl Strategy for MockStrategy {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> Address {
        self.asset
    }

    fn total_assets(&self) -> u128 {
        self.balance()
    }

    fn assets_of(&self, owner: &Address) -> u128 {
        let balance = self.balance();
        let state = self.state.lock();
        if let Some(claim) = state.claims.get(owner) {
            (*claim).min(balance)
        } else if state.depositors.contains(owner) {
            balance.saturating_sub(state.claimed())
        } else {
            0
        }
    }

    fn max_deposit(&self, _receiver: &Address) -> u128 {
        let balance = self.balance();
        self.state.lock().max_debt.saturating_sub(balance)
    }

    fn max_withdraw(&self, owner: &Address) -> u128 {
        let liquid = self.balance().saturating_sub(self.state.lock().locked);
        self.assets_of(owner).min(liquid)
    }

    fn deposit(&self, assets: u128, receiver: &Address) -> Result<u128, ExternalError> {
        if assets > self.max_deposit(receiver) {
            return Err(self.revert("exceeds max deposit"));
        }
        let ratio = u128::from(self.state.lock().deposit_ratio_bps);
        let absorbed = mul_div(assets, ratio, MAX_BPS, Rounding::Down)
            .map_err(|err| self.revert(&err.to_string()))?;

        self.ledger
            .write()
            .transfer_from(&self.address, receiver, &self.address, absorbed)?;
        self.state.lock().depositors.insert(*receiver);

        debug!(strategy = %self.address, offered = assets, absorbed, "mock strategy deposit");
        Ok(absorbed)
    }

    fn withdraw(&self, assets: u128, receiver: &Address, owner: &Address) -> Result<u128, ExternalError> {
        if assets > self.max_withdraw(owner) {
            return Err(self.revert("exceeds max withdraw"));
        }
        let (shortfall, surplus) = {
            let mut state = self.state.lock();
            if let Some(claim) = state.claims.get_mut(owner) {
                *claim -= assets;
            }
            (state.withdraw_shortfall.min(assets), state.withdraw_surplus)
        };

        let mut ledger = self.ledger.write();
        let balance = ledger.balance_of(&self.address);
        let paid = (assets - shortfall).saturating_add(surplus).min(balance - shortfall);
        ledger.transfer(&self.address, receiver, paid)?;
        if shortfall > 0 {
            ledger.burn(&self.address, shortfall)?;
        }

        debug!(strategy = %self.address, requested = assets, paid, "mock strategy withdraw");
        Ok(paid)
    }

    fn transfer_position(&self, from: &Address, to: &Address, assets: u128) -> Result<(), ExternalError> {
        if self.assets_of(from) < assets {
            return Err(self.revert("insufficient position"));
        }
        let mut state = self.state.lock();
        if let Some(claim) = state.claims.get_mut(from) {
            *claim -= assets;
        }
        *state.claims.entry(*to).or_insert(0) += assets;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::AssetLedger;

    fn setup() -> (SharedLedger, MockStrategy, Address) {
        let ledger = AssetLedger::new("USDS", 6).shared();
        let strategy = MockStrategy::new("strategy", &ledger);
        let vault = Address::from_label("vault");
        ledger.write().mint(&vault, 1_000).unwrap();
        (ledger, strategy, vault)
    }

    fn fund(ledger: &SharedLedger, strategy: &MockStrategy, vault: &Address, amount: u128) {
        ledger.write().approve(vault, &strategy.address(), amount);
        strategy.deposit(amount, vault).unwrap();
    }

    #[test]
    fn deposit_pulls_against_allowance() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 400);
        assert_eq!(strategy.total_assets(), 400);
        assert_eq!(strategy.assets_of(&vault), 400);
        assert_eq!(ledger.read().balance_of(&vault), 600);
    }

    #[test]
    fn deposit_without_allowance_fails() {
        let (_ledger, strategy, vault) = setup();
        assert!(strategy.deposit(100, &vault).is_err());
    }

    #[test]
    fn partial_absorption() {
        let (ledger, strategy, vault) = setup();
        strategy.set_deposit_ratio_bps(5_000);
        ledger.write().approve(&vault, &strategy.address(), 400);
        assert_eq!(strategy.deposit(400, &vault).unwrap(), 200);
        assert_eq!(strategy.total_assets(), 200);
    }

    #[test]
    fn capacity_is_enforced() {
        let (ledger, strategy, vault) = setup();
        strategy.set_max_debt(300);
        assert_eq!(strategy.max_deposit(&vault), 300);
        ledger.write().approve(&vault, &strategy.address(), 400);
        assert!(strategy.deposit(400, &vault).is_err());
    }

    #[test]
    fn locked_funds_limit_withdrawals() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        strategy.set_locked_funds(200);
        assert_eq!(strategy.max_withdraw(&vault), 300);
        assert!(strategy.withdraw(400, &vault, &vault).is_err());
    }

    #[test]
    fn lossy_withdraw_burns_the_shortfall() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        strategy.set_withdraw_shortfall(50);
        assert_eq!(strategy.withdraw(200, &vault, &vault).unwrap(), 150);
        assert_eq!(strategy.total_assets(), 300);
        assert_eq!(ledger.read().balance_of(&vault), 650);
    }

    #[test]
    fn generous_withdraw_pays_extra() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        strategy.set_withdraw_surplus(25);
        assert_eq!(strategy.withdraw(200, &vault, &vault).unwrap(), 225);
        assert_eq!(strategy.total_assets(), 275);
    }

    #[test]
    fn gains_and_losses_move_the_pool() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        strategy.simulate_gain(100).unwrap();
        assert_eq!(strategy.assets_of(&vault), 600);
        strategy.simulate_loss(250).unwrap();
        assert_eq!(strategy.assets_of(&vault), 350);
    }

    #[test]
    fn position_transfer_carves_out_a_claim() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        let buyer = Address::from_label("buyer");
        strategy.transfer_position(&vault, &buyer, 200).unwrap();
        assert_eq!(strategy.assets_of(&buyer), 200);
        assert_eq!(strategy.assets_of(&vault), 300);
        assert!(strategy.transfer_position(&vault, &buyer, 301).is_err());
    }

    #[test]
    fn strangers_hold_nothing() {
        let (ledger, strategy, vault) = setup();
        fund(&ledger, &strategy, &vault, 500);
        assert_eq!(strategy.assets_of(&Address::from_label("stranger")), 0);
    }
}
