//! Roles, governance handoff, configuration setters and shutdown.

use std::sync::Arc;

use tracing::{info, warn};

use super::Vault;
use crate::address::Address;
use crate::collaborators::{Accountant, DepositLimitModule, WithdrawLimitModule};
use crate::config::MAX_PROFIT_UNLOCK_TIME;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::roles::Roles;

impl Vault {
    fn require_role_manager(&self, caller: &Address) -> Result<(), VaultError> {
        if *caller == self.state.role_manager.current() {
            Ok(())
        } else {
            Err(VaultError::NotRoleManager)
        }
    }

    fn store_roles(&mut self, account: Address, roles: Roles) {
        if roles.is_empty() {
            self.state.roles.remove(&account);
        } else {
            self.state.roles.insert(account, roles);
        }
        self.emit(VaultEvent::RoleSet {
            account,
            role: roles,
        });
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Replaces `account`'s capabilities with `roles`.
    pub fn set_role(&mut self, caller: &Address, account: &Address, roles: Roles) -> Result<(), VaultError> {
        self.require_role_manager(caller)?;
        self.store_roles(*account, roles);
        Ok(())
    }

    /// Grants `roles` to `account`, keeping everything it already has.
    pub fn add_role(&mut self, caller: &Address, account: &Address, roles: Roles) -> Result<(), VaultError> {
        self.require_role_manager(caller)?;
        let next = self.roles(account).union(roles);
        self.store_roles(*account, next);
        Ok(())
    }

    /// Takes `roles` away from `account`, leaving its other capabilities.
    pub fn remove_role(&mut self, caller: &Address, account: &Address, roles: Roles) -> Result<(), VaultError> {
        self.require_role_manager(caller)?;
        let next = self.roles(account).difference(roles);
        self.store_roles(*account, next);
        Ok(())
    }

    /// Nominates `next` as role manager. Takes effect once `next` accepts.
    pub fn transfer_role_manager(&mut self, caller: &Address, next: &Address) -> Result<(), VaultError> {
        self.state.role_manager.nominate(caller, *next)
    }

    /// Completes a role manager handoff.
    pub fn accept_role_manager(&mut self, caller: &Address) -> Result<(), VaultError> {
        let role_manager = self.state.role_manager.accept(caller)?;
        self.emit(VaultEvent::UpdateRoleManager { role_manager });
        info!(vault = %self.address, %role_manager, "role manager changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Replaces the accountant. `None` disables fees and refunds.
    pub fn set_accountant(
        &mut self,
        caller: &Address,
        accountant: Option<Arc<dyn Accountant>>,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::ACCOUNTANT_MANAGER)?;
        let address = accountant.as_ref().map(|a| a.address()).unwrap_or(Address::ZERO);
        self.state.accountant = accountant;
        self.emit(VaultEvent::UpdateAccountant {
            accountant: address,
        });
        Ok(())
    }

    /// Sets a fixed deposit limit. While a deposit limit module is set this
    /// fails unless `override_module` is true, in which case the module is
    /// removed.
    pub fn set_deposit_limit(
        &mut self,
        caller: &Address,
        deposit_limit: u128,
        override_module: bool,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::DEPOSIT_LIMIT_MANAGER)?;
        if self.state.shutdown {
            return Err(VaultError::Shutdown);
        }
        if self.state.deposit_limit_module.is_some() {
            if !override_module {
                return Err(VaultError::UsingModule);
            }
            self.state.deposit_limit_module = None;
            self.emit(VaultEvent::UpdateDepositLimitModule {
                deposit_limit_module: Address::ZERO,
            });
        }
        self.state.deposit_limit = deposit_limit;
        self.emit(VaultEvent::UpdateDepositLimit { deposit_limit });
        Ok(())
    }

    /// Hands deposit limits to a module. While a fixed limit other than
    /// `u128::MAX` is set this fails unless `override_limit` is true, in
    /// which case the fixed limit is lifted.
    pub fn set_deposit_limit_module(
        &mut self,
        caller: &Address,
        module: Option<Arc<dyn DepositLimitModule>>,
        override_limit: bool,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::DEPOSIT_LIMIT_MANAGER)?;
        if self.state.shutdown {
            return Err(VaultError::Shutdown);
        }
        if module.is_some() && self.state.deposit_limit != u128::MAX {
            if !override_limit {
                return Err(VaultError::UsingDepositLimit);
            }
            self.state.deposit_limit = u128::MAX;
            self.emit(VaultEvent::UpdateDepositLimit {
                deposit_limit: u128::MAX,
            });
        }
        let address = module.as_ref().map(|m| m.address()).unwrap_or(Address::ZERO);
        self.state.deposit_limit_module = module;
        self.emit(VaultEvent::UpdateDepositLimitModule {
            deposit_limit_module: address,
        });
        Ok(())
    }

    /// Installs or removes the withdraw limit module.
    pub fn set_withdraw_limit_module(
        &mut self,
        caller: &Address,
        module: Option<Arc<dyn WithdrawLimitModule>>,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::WITHDRAW_LIMIT_MANAGER)?;
        let address = module.as_ref().map(|m| m.address()).unwrap_or(Address::ZERO);
        self.state.withdraw_limit_module = module;
        self.emit(VaultEvent::UpdateWithdrawLimitModule {
            withdraw_limit_module: address,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    /// Sets the idle floor debt increases must leave in the vault.
    pub fn set_minimum_total_idle(&mut self, caller: &Address, minimum_total_idle: u128) -> Result<(), VaultError> {
        self.require_role(caller, Roles::MINIMUM_IDLE_MANAGER)?;
        self.state.minimum_total_idle = minimum_total_idle;
        self.emit(VaultEvent::UpdateMinimumTotalIdle { minimum_total_idle });
        Ok(())
    }

    /// Changes the profit unlock window. Zero releases the whole buffer
    /// immediately and disables locking; any other value only applies to
    /// future reports.
    pub fn set_profit_max_unlock_time(
        &mut self,
        caller: &Address,
        profit_max_unlock_time: u64,
    ) -> Result<(), VaultError> {
        self.atomically("set_profit_max_unlock_time", move |vault| {
            vault.require_role(caller, Roles::PROFIT_UNLOCK_MANAGER)?;
            if profit_max_unlock_time > MAX_PROFIT_UNLOCK_TIME {
                return Err(VaultError::ProfitUnlockTimeTooLong);
            }
            if profit_max_unlock_time == 0 {
                let vault_address = vault.address;
                let buffer = vault.state.shares.balance_of(&vault_address);
                if buffer > 0 {
                    vault.burn_shares(&vault_address, buffer)?;
                }
                vault.state.unlock.clear();
            }
            vault.state.unlock.profit_max_unlock_time = profit_max_unlock_time;
            vault.emit(VaultEvent::UpdateProfitMaxUnlockTime {
                profit_max_unlock_time,
            });
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Shuts the vault down for good. Deposits stop, debt can only be
    /// pulled back, and the caller gains the debt manager role to do so.
    pub fn shutdown_vault(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.require_role(caller, Roles::EMERGENCY_MANAGER)?;
        if self.state.shutdown {
            return Err(VaultError::AlreadyShutdown);
        }
        self.state.shutdown = true;

        if self.state.deposit_limit_module.take().is_some() {
            self.emit(VaultEvent::UpdateDepositLimitModule {
                deposit_limit_module: Address::ZERO,
            });
        }
        self.state.deposit_limit = 0;
        self.emit(VaultEvent::UpdateDepositLimit { deposit_limit: 0 });

        let widened = self.roles(caller).union(Roles::DEBT_MANAGER);
        self.store_roles(*caller, widened);
        self.emit(VaultEvent::Shutdown);

        warn!(vault = %self.address, by = %caller, "vault shut down");
        Ok(())
    }
}
