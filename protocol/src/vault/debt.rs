//! Debt rebalancing: moving assets between the vault's idle balance and
//! its strategies.
//!
//! Strategies are free to absorb less than offered or return more or less
//! than asked. Bookkeeping is recorded for the requested amount before the
//! strategy is called and then corrected to the measured balance change,
//! so `total_idle` always matches what actually arrived.

use std::sync::Arc;

use tracing::{info, warn};

use super::Vault;
use crate::address::Address;
use crate::collaborators::Strategy;
use crate::config::MAX_BPS;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::math::{self, mul_div, Rounding};
use crate::roles::Roles;

pub(super) fn check_max_loss(max_loss: Option<u16>) -> Result<(), VaultError> {
    match max_loss {
        Some(bps) if u128::from(bps) > MAX_BPS => Err(VaultError::MaxLossOutOfRange),
        _ => Ok(()),
    }
}

impl Vault {
    /// Moves `strategy`'s debt toward `target_debt` and returns the debt it
    /// ends up with.
    ///
    /// Increases are limited by the strategy's debt cap (exceeding it is an
    /// error), the idle floor and the strategy's capacity. Decreases are
    /// limited by what the strategy can return right now and widened when
    /// the idle floor needs topping up. `max_loss` bounds the shortfall a
    /// decrease may realize, in basis points of the amount requested; `None`
    /// accepts any shortfall.
    pub fn update_debt(
        &mut self,
        caller: &Address,
        strategy: &Address,
        target_debt: u128,
        max_loss: Option<u16>,
    ) -> Result<u128, VaultError> {
        let strategy = *strategy;
        self.atomically("update_debt", move |vault| {
            vault.require_role(caller, Roles::DEBT_MANAGER)?;
            check_max_loss(max_loss)?;
            let params = vault.state.registry.params(&strategy);
            if !params.is_active() {
                return Err(VaultError::InactiveStrategy);
            }
            let handle = vault.state.registry.handle(&strategy)?;
            let current_debt = params.current_debt;

            let target = if vault.state.shutdown { 0 } else { target_debt };
            if target > current_debt && target > params.max_debt {
                return Err(VaultError::TargetDebtAboveMax);
            }
            let target = target.min(params.max_debt);
            if target == current_debt {
                return Err(VaultError::NewDebtEqualsCurrentDebt);
            }

            let new_debt = if target > current_debt {
                vault.increase_debt(&handle, current_debt, target)?
            } else {
                vault.decrease_debt(&handle, current_debt, target, max_loss)?
            };

            vault.state.registry.params_mut(&strategy)?.current_debt = new_debt;
            vault.emit(VaultEvent::DebtUpdated {
                strategy,
                current_debt,
                new_debt,
            });
            info!(vault = %vault.address, %strategy, current_debt, new_debt, "debt updated");
            Ok(new_debt)
        })
    }

    fn increase_debt(
        &mut self,
        strategy: &Arc<dyn Strategy>,
        current_debt: u128,
        target: u128,
    ) -> Result<u128, VaultError> {
        let idle = self.state.total_idle;
        let minimum_idle = self.state.minimum_total_idle;
        if idle <= minimum_idle {
            return Err(VaultError::NoFundsToDeposit);
        }
        let capacity = strategy.max_deposit(&self.address);
        let to_deposit = (target - current_debt)
            .min(idle - minimum_idle)
            .min(capacity);
        if to_deposit == 0 {
            return Ok(current_debt);
        }

        self.state.total_idle -= to_deposit;
        self.state.total_debt = math::add(self.state.total_debt, to_deposit, "total debt")?;

        let strategy_address = strategy.address();
        let before = self.asset_balance();
        self.ledger
            .write()
            .approve(&self.address, &strategy_address, to_deposit);
        let outcome = strategy.deposit(to_deposit, &self.address);
        self.ledger.write().approve(&self.address, &strategy_address, 0);
        outcome?;
        let absorbed = before.saturating_sub(self.asset_balance()).min(to_deposit);

        if absorbed < to_deposit {
            let unabsorbed = to_deposit - absorbed;
            self.state.total_idle += unabsorbed;
            self.state.total_debt -= unabsorbed;
            warn!(
                vault = %self.address,
                strategy = %strategy_address,
                offered = to_deposit,
                absorbed,
                "strategy absorbed less than offered"
            );
        }
        Ok(current_debt + absorbed)
    }

    fn decrease_debt(
        &mut self,
        strategy: &Arc<dyn Strategy>,
        current_debt: u128,
        target: u128,
        max_loss: Option<u16>,
    ) -> Result<u128, VaultError> {
        let idle = self.state.total_idle;
        let minimum_idle = self.state.minimum_total_idle;
        let mut to_withdraw = current_debt - target;
        if idle.saturating_add(to_withdraw) < minimum_idle {
            to_withdraw = (minimum_idle - idle).min(current_debt);
        }

        let withdrawable = strategy.max_withdraw(&self.address);
        if withdrawable == 0 {
            return Err(VaultError::NothingToWithdraw);
        }
        to_withdraw = to_withdraw.min(withdrawable);

        if self.unrealised_loss_share(strategy.as_ref(), current_debt, to_withdraw)? != 0 {
            return Err(VaultError::UnrealisedLosses);
        }

        self.state.total_idle = math::add(self.state.total_idle, to_withdraw, "total idle")?;
        self.state.total_debt -= to_withdraw;

        let strategy_address = strategy.address();
        let before = self.asset_balance();
        strategy.withdraw(to_withdraw, &self.address, &self.address)?;
        let withdrawn = self
            .asset_balance()
            .saturating_sub(before)
            .min(current_debt);

        if withdrawn < to_withdraw {
            let shortfall = to_withdraw - withdrawn;
            if let Some(bps) = max_loss {
                let tolerated = mul_div(to_withdraw, u128::from(bps), MAX_BPS, Rounding::Down)?;
                if shortfall > tolerated {
                    return Err(VaultError::TooMuchLoss);
                }
            }
            // The debt is gone either way; only what arrived becomes idle.
            self.state.total_idle -= shortfall;
            warn!(
                vault = %self.address,
                strategy = %strategy_address,
                requested = to_withdraw,
                withdrawn,
                "strategy returned less than requested"
            );
            Ok(current_debt - to_withdraw)
        } else {
            let surplus = withdrawn - to_withdraw;
            if surplus > 0 {
                self.state.total_idle += surplus;
                self.state.total_debt -= surplus;
            }
            Ok(current_debt - withdrawn)
        }
    }

    /// The part of `assets_needed` that a strategy's unrealised loss would
    /// wipe out, pro rata to its debt.
    pub(super) fn unrealised_loss_share(
        &self,
        strategy: &dyn Strategy,
        current_debt: u128,
        assets_needed: u128,
    ) -> Result<u128, VaultError> {
        if current_debt == 0 || assets_needed == 0 {
            return Ok(0);
        }
        let strategy_assets = strategy.assets_of(&self.address);
        if strategy_assets >= current_debt {
            return Ok(0);
        }
        let recoverable = mul_div(assets_needed, strategy_assets, current_debt, Rounding::Down)?;
        Ok(assets_needed - recoverable)
    }

    /// Sells `amount` of `strategy`'s debt to the caller. The caller pays
    /// the vault in assets and receives the matching slice of the vault's
    /// position in the strategy.
    pub fn buy_debt(&mut self, caller: &Address, strategy: &Address, amount: u128) -> Result<(), VaultError> {
        let (caller, strategy) = (*caller, *strategy);
        self.atomically("buy_debt", move |vault| {
            vault.require_role(&caller, Roles::DEBT_PURCHASER)?;
            let params = vault.state.registry.params(&strategy);
            if !params.is_active() {
                return Err(VaultError::InactiveStrategy);
            }
            let current_debt = params.current_debt;
            if current_debt == 0 {
                return Err(VaultError::NothingToBuy);
            }
            if amount == 0 {
                return Err(VaultError::NothingToBuyWith);
            }
            let amount = amount.min(current_debt);
            let handle = vault.state.registry.handle(&strategy)?;
            let position = mul_div(handle.assets_of(&vault.address), amount, current_debt, Rounding::Down)?;
            if position == 0 {
                return Err(VaultError::CannotBuyZero);
            }

            let vault_address = vault.address;
            vault
                .ledger
                .write()
                .transfer_from(&vault_address, &caller, &vault_address, amount)?;

            let new_debt = current_debt - amount;
            vault.state.registry.params_mut(&strategy)?.current_debt = new_debt;
            vault.state.total_debt -= amount;
            vault.state.total_idle = math::add(vault.state.total_idle, amount, "total idle")?;
            vault.emit(VaultEvent::DebtUpdated {
                strategy,
                current_debt,
                new_debt,
            });

            handle.transfer_position(&vault_address, &caller, position)?;
            vault.emit(VaultEvent::DebtPurchased { strategy, amount });
            info!(vault = %vault.address, %strategy, buyer = %caller, amount, "debt purchased");
            Ok(())
        })
    }
}
