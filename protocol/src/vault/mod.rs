//! # Vault
//!
//! A [`Vault`] pools one asset from many depositors, issues shares against
//! it and lends the pool out to strategies. This module holds the aggregate
//! itself, its read-only views and the share-token surface. The mutating
//! flows live in submodules:
//!
//! - `access`: roles, governance handoff, setters, shutdown.
//! - `strategies`: strategy lifecycle and the default queue.
//! - `debt`: moving assets between idle and strategies.
//! - `report`: realizing gains and losses, fees and profit locking.
//! - `flows`: deposits and exits.
//!
//! ## Atomicity
//!
//! Every public mutating call runs through [`Vault::atomically`]. The vault
//! snapshots its own state, the asset ledger and the event log before the
//! call and restores all three if the call fails, so a failed call leaves
//! no trace. Collaborators that keep their economic state in the shared
//! ledger are rolled back with it.
//!
//! ## Collaborator discipline
//!
//! The ledger lock is never held across a collaborator call, and amounts a
//! collaborator claims to have moved are never trusted. The vault records
//! its intended bookkeeping first, calls out, then reconciles against the
//! measured change in its own asset balance.

mod access;
mod debt;
mod flows;
mod report;
mod strategies;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::address::Address;
use crate::clock::{Clock, Timestamp};
use crate::collaborators::{Accountant, DepositLimitModule, ProtocolFeeSource, WithdrawLimitModule};
use crate::config::{VaultConfig, API_VERSION, MAX_DECIMALS};
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::ledger::SharedLedger;
use crate::math::{self, Rounding};
use crate::registry::{StrategyParams, StrategyRegistry};
use crate::roles::{RoleManagerHandoff, Roles};
use crate::shares::ShareLedger;
use crate::unlock::ProfitUnlock;

pub use flows::ExitOptions;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// The host a vault runs in.
#[derive(Debug, Clone)]
pub struct VaultEnv {
    /// The vault's own address.
    pub address: Address,
    /// Ledger of the asset the vault accepts.
    pub ledger: SharedLedger,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Where the protocol fee configuration comes from.
    pub protocol_fees: Arc<dyn ProtocolFeeSource>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a failed call must be able to roll back.
#[derive(Debug, Clone)]
struct VaultState {
    total_idle: u128,
    total_debt: u128,
    minimum_total_idle: u128,
    deposit_limit: u128,
    deposit_limit_module: Option<Arc<dyn DepositLimitModule>>,
    withdraw_limit_module: Option<Arc<dyn WithdrawLimitModule>>,
    use_default_queue: bool,
    shutdown: bool,
    accountant: Option<Arc<dyn Accountant>>,
    roles: HashMap<Address, Roles>,
    role_manager: RoleManagerHandoff,
    registry: StrategyRegistry,
    shares: ShareLedger,
    unlock: ProfitUnlock,
}

/// A multi-strategy asset vault.
#[derive(Debug)]
pub struct Vault {
    address: Address,
    asset: Address,
    name: String,
    symbol: String,
    decimals: u8,
    ledger: SharedLedger,
    clock: Arc<dyn Clock>,
    protocol_fees: Arc<dyn ProtocolFeeSource>,
    state: VaultState,
    events: Vec<VaultEvent>,
}

impl Vault {
    /// Creates a vault. This is the only way to construct one, so a vault
    /// can never be initialized twice.
    pub fn initialize(env: VaultEnv, config: VaultConfig) -> Result<Self, VaultError> {
        config.validate()?;
        if env.address.is_zero() {
            return Err(VaultError::ZeroAddress { what: "vault" });
        }
        let (asset, decimals) = {
            let ledger = env.ledger.read();
            (ledger.address(), ledger.decimals())
        };
        if decimals > MAX_DECIMALS {
            return Err(VaultError::InvalidConfig(format!(
                "asset decimals {} exceed {}",
                decimals, MAX_DECIMALS
            )));
        }

        let mut roles = HashMap::new();
        if !config.role_manager_roles.is_empty() {
            roles.insert(config.role_manager, config.role_manager_roles);
        }

        let mut vault = Self {
            address: env.address,
            asset,
            name: config.name,
            symbol: config.symbol,
            decimals,
            ledger: env.ledger,
            clock: env.clock,
            protocol_fees: env.protocol_fees,
            state: VaultState {
                total_idle: 0,
                total_debt: 0,
                minimum_total_idle: 0,
                deposit_limit: 0,
                deposit_limit_module: None,
                withdraw_limit_module: None,
                use_default_queue: false,
                shutdown: false,
                accountant: None,
                roles,
                role_manager: RoleManagerHandoff::new(config.role_manager),
                registry: StrategyRegistry::new(),
                shares: ShareLedger::new(),
                unlock: ProfitUnlock::new(config.profit_max_unlock_time),
            },
            events: Vec::new(),
        };
        vault.emit(VaultEvent::RoleSet {
            account: config.role_manager,
            role: config.role_manager_roles,
        });
        vault.emit(VaultEvent::UpdateRoleManager {
            role_manager: config.role_manager,
        });

        info!(
            vault = %vault.address,
            asset = %vault.asset,
            name = %vault.name,
            "vault initialized"
        );
        Ok(vault)
    }

    /// Runs `op` as one all-or-nothing call.
    fn atomically<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let state = self.state.clone();
        let ledger = self.ledger.read().clone();
        let events = self.events.len();

        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = state;
                *self.ledger.write() = ledger;
                self.events.truncate(events);
                warn!(vault = %self.address, op, error = %err, "call reverted");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn emit(&mut self, event: VaultEvent) {
        self.events.push(event);
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn require_role(&self, caller: &Address, role: Roles) -> Result<(), VaultError> {
        if self.roles(caller).contains(role) {
            Ok(())
        } else {
            Err(VaultError::NotAllowed)
        }
    }

    /// The vault's measured asset balance.
    fn asset_balance(&self) -> u128 {
        self.ledger.read().balance_of(&self.address)
    }

    fn mint_shares(&mut self, to: &Address, shares: u128) -> Result<(), VaultError> {
        self.state.shares.mint(to, shares)?;
        self.emit(VaultEvent::Transfer {
            sender: Address::ZERO,
            receiver: *to,
            value: shares,
        });
        Ok(())
    }

    fn burn_shares(&mut self, from: &Address, shares: u128) -> Result<(), VaultError> {
        self.state.shares.burn(from, shares)?;
        self.emit(VaultEvent::Transfer {
            sender: *from,
            receiver: Address::ZERO,
            value: shares,
        });
        Ok(())
    }

    /// Burns whatever part of the profit buffer has unlocked by now.
    fn release_unlocked(&mut self) -> Result<(), VaultError> {
        let now = self.now();
        let buffer = self.state.shares.balance_of(&self.address);
        let unlocked = self.state.unlock.unlocked_shares(now, buffer);
        if unlocked == 0 {
            return Ok(());
        }
        let vault = self.address;
        self.burn_shares(&vault, unlocked)?;
        self.state.unlock.mark_released(now);
        debug!(vault = %self.address, unlocked, "released unlocked profit");
        Ok(())
    }

    /// Mints shares worth `amount` at the price before `amount` was added
    /// to the vault's totals. Callers add `amount` to idle or debt first.
    fn issue_shares_for_amount(&mut self, amount: u128, recipient: &Address) -> Result<u128, VaultError> {
        let total_supply = self.total_supply();
        let total_assets = self.total_assets();
        let new_shares = if total_supply == 0 {
            amount
        } else if total_assets > amount {
            math::mul_div(amount, total_supply, total_assets - amount, Rounding::Down)?
        } else {
            // Existing shares are worth nothing; new ones cannot be priced.
            return Err(VaultError::AmountTooHigh);
        };
        if new_shares > 0 {
            self.mint_shares(recipient, new_shares)?;
        }
        Ok(new_shares)
    }

    fn shares_for(&self, assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
        ShareLedger::shares_for_assets(assets, self.total_assets(), self.total_supply(), rounding)
    }

    fn assets_for(&self, shares: u128, rounding: Rounding) -> Result<u128, VaultError> {
        ShareLedger::assets_for_shares(shares, self.total_assets(), self.total_supply(), rounding)
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// The vault's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the underlying asset.
    pub fn asset(&self) -> Address {
        self.asset
    }

    /// Share token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Share token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Share decimals, equal to the asset's.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Accounting API version.
    pub fn api_version(&self) -> &'static str {
        API_VERSION
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Accounting views
    // -----------------------------------------------------------------------

    /// Assets held directly by the vault.
    pub fn total_idle(&self) -> u128 {
        self.state.total_idle
    }

    /// Assets lent to strategies.
    pub fn total_debt(&self) -> u128 {
        self.state.total_debt
    }

    /// Idle plus debt.
    pub fn total_assets(&self) -> u128 {
        // Both sides are bounded by real balances; the sum cannot overflow
        // without the asset supply overflowing first.
        self.state.total_idle.saturating_add(self.state.total_debt)
    }

    /// Profit buffer shares that have unlocked but are not yet burned.
    pub fn unlocked_shares(&self) -> u128 {
        let buffer = self.state.shares.balance_of(&self.address);
        self.state.unlock.unlocked_shares(self.now(), buffer)
    }

    /// Circulating supply: stored supply minus unlocked buffer shares.
    pub fn total_supply(&self) -> u128 {
        self.state.shares.total_supply() - self.unlocked_shares()
    }

    /// Share balance of `owner`. The vault's own balance excludes shares
    /// that have already unlocked.
    pub fn balance_of(&self, owner: &Address) -> u128 {
        let stored = self.state.shares.balance_of(owner);
        if *owner == self.address {
            stored - self.unlocked_shares()
        } else {
            stored
        }
    }

    /// Share allowance of `spender` over `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state.shares.allowance(owner, spender)
    }

    /// Shares `assets` would buy, rounded down.
    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        self.shares_for(assets, Rounding::Down)
    }

    /// Assets `shares` are worth, rounded down.
    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        self.assets_for(shares, Rounding::Down)
    }

    /// Assets per whole share, in asset base units.
    pub fn price_per_share(&self) -> Result<u128, VaultError> {
        let unit = 10u128
            .checked_pow(u32::from(self.decimals))
            .ok_or(VaultError::Overflow { context: "share unit" })?;
        self.assets_for(unit, Rounding::Down)
    }

    /// Shares a deposit of `assets` would mint.
    pub fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        self.shares_for(assets, Rounding::Down)
    }

    /// Assets needed to mint `shares`.
    pub fn preview_mint(&self, shares: u128) -> Result<u128, VaultError> {
        self.assets_for(shares, Rounding::Up)
    }

    /// Shares a withdrawal of `assets` would burn.
    pub fn preview_withdraw(&self, assets: u128) -> Result<u128, VaultError> {
        self.shares_for(assets, Rounding::Up)
    }

    /// Assets a redemption of `shares` would pay, before any loss.
    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        self.assets_for(shares, Rounding::Down)
    }

    // -----------------------------------------------------------------------
    // Configuration views
    // -----------------------------------------------------------------------

    /// Idle floor kept back from strategies.
    pub fn minimum_total_idle(&self) -> u128 {
        self.state.minimum_total_idle
    }

    /// Fixed deposit limit. `u128::MAX` while a module is in charge.
    pub fn deposit_limit(&self) -> u128 {
        self.state.deposit_limit
    }

    /// Address of the deposit limit module, or zero.
    pub fn deposit_limit_module(&self) -> Address {
        self.state
            .deposit_limit_module
            .as_ref()
            .map(|m| m.address())
            .unwrap_or(Address::ZERO)
    }

    /// Address of the withdraw limit module, or zero.
    pub fn withdraw_limit_module(&self) -> Address {
        self.state
            .withdraw_limit_module
            .as_ref()
            .map(|m| m.address())
            .unwrap_or(Address::ZERO)
    }

    /// Address of the accountant, or zero.
    pub fn accountant(&self) -> Address {
        self.state
            .accountant
            .as_ref()
            .map(|a| a.address())
            .unwrap_or(Address::ZERO)
    }

    /// Whether exits must use the default queue.
    pub fn use_default_queue(&self) -> bool {
        self.state.use_default_queue
    }

    /// Whether the vault has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.state.shutdown
    }

    /// The default withdrawal queue.
    pub fn default_queue(&self) -> Vec<Address> {
        self.state.registry.queue().as_slice().to_vec()
    }

    /// Parameters of `strategy`; all zero when inactive.
    pub fn strategies(&self, strategy: &Address) -> StrategyParams {
        self.state.registry.params(strategy)
    }

    /// Capabilities of `account`.
    pub fn roles(&self, account: &Address) -> Roles {
        self.state.roles.get(account).copied().unwrap_or_default()
    }

    /// The account in charge of roles.
    pub fn role_manager(&self) -> Address {
        self.state.role_manager.current()
    }

    /// The nominated next role manager, or zero.
    pub fn future_role_manager(&self) -> Address {
        self.state.role_manager.pending()
    }

    /// Length of a full profit unlock window.
    pub fn profit_max_unlock_time(&self) -> u64 {
        self.state.unlock.profit_max_unlock_time
    }

    /// When the current buffer will have fully unlocked, or zero.
    pub fn full_profit_unlock_date(&self) -> Timestamp {
        self.state.unlock.full_profit_unlock_date
    }

    /// Buffer release rate, scaled by `MAX_BPS_EXTENDED`.
    pub fn profit_unlocking_rate(&self) -> u128 {
        self.state.unlock.profit_unlocking_rate
    }

    /// Last time unlocked shares were burned.
    pub fn last_profit_update(&self) -> Timestamp {
        self.state.unlock.last_profit_update
    }

    // -----------------------------------------------------------------------
    // Share token
    // -----------------------------------------------------------------------

    /// Moves `amount` shares from `caller` to `receiver`.
    pub fn transfer(&mut self, caller: &Address, receiver: &Address, amount: u128) -> Result<(), VaultError> {
        let (caller, receiver) = (*caller, *receiver);
        self.atomically("transfer", move |vault| vault.transfer_shares(&caller, &receiver, amount))
    }

    /// Lets `spender` move up to `amount` of `owner`'s shares.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) -> Result<(), VaultError> {
        if spender.is_zero() {
            return Err(VaultError::ZeroAddress { what: "spender" });
        }
        self.state.shares.approve(owner, spender, amount);
        self.emit(VaultEvent::Approval {
            owner: *owner,
            spender: *spender,
            value: amount,
        });
        Ok(())
    }

    /// Moves `amount` of `owner`'s shares to `receiver` on `caller`'s
    /// allowance.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        owner: &Address,
        receiver: &Address,
        amount: u128,
    ) -> Result<(), VaultError> {
        let (caller, owner, receiver) = (*caller, *owner, *receiver);
        self.atomically("transfer_from", move |vault| {
            vault.state.shares.spend_allowance(&owner, &caller, amount)?;
            vault.transfer_shares(&owner, &receiver, amount)
        })
    }

    fn transfer_shares(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), VaultError> {
        if to.is_zero() || *to == self.address {
            return Err(VaultError::InvalidReceiver);
        }
        self.state.shares.transfer(from, to, amount)?;
        self.emit(VaultEvent::Transfer {
            sender: *from,
            receiver: *to,
            value: amount,
        });
        Ok(())
    }
}
