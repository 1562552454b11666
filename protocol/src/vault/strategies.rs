//! Strategy lifecycle and the default queue.

use std::sync::Arc;

use tracing::{info, warn};

use super::Vault;
use crate::address::Address;
use crate::collaborators::Strategy;
use crate::error::VaultError;
use crate::events::{StrategyChangeType, VaultEvent};
use crate::roles::Roles;

impl Vault {
    /// Registers `strategy` with zero debt and a zero debt cap. When
    /// `add_to_queue` is set it is appended to the default queue, unless the
    /// queue is already full.
    pub fn add_strategy(
        &mut self,
        caller: &Address,
        strategy: Arc<dyn Strategy>,
        add_to_queue: bool,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::ADD_STRATEGY_MANAGER)?;
        let address = strategy.address();
        if address.is_zero() {
            return Err(VaultError::ZeroAddress { what: "strategy" });
        }
        if strategy.asset() != self.asset {
            return Err(VaultError::InvalidAsset);
        }
        let now = self.now();
        let queued = self.state.registry.activate(strategy, now, add_to_queue)?;
        if add_to_queue && !queued {
            warn!(vault = %self.address, strategy = %address, "default queue full, strategy not queued");
        }

        self.emit(VaultEvent::StrategyChanged {
            strategy: address,
            change_type: StrategyChangeType::Added,
        });
        info!(vault = %self.address, strategy = %address, queued, "strategy added");
        Ok(())
    }

    /// Removes a strategy that holds no debt.
    pub fn revoke_strategy(&mut self, caller: &Address, strategy: &Address) -> Result<(), VaultError> {
        self.require_role(caller, Roles::REVOKE_STRATEGY_MANAGER)?;
        let params = self.state.registry.params(strategy);
        if !params.is_active() {
            return Err(VaultError::StrategyNotActive);
        }
        if params.current_debt != 0 {
            return Err(VaultError::StrategyHasDebt);
        }
        self.deactivate_strategy(strategy);
        Ok(())
    }

    /// Removes a strategy regardless of its debt. Outstanding debt is
    /// realized as a loss first, absorbed by the profit buffer where
    /// possible and by every holder otherwise.
    pub fn force_revoke_strategy(&mut self, caller: &Address, strategy: &Address) -> Result<(), VaultError> {
        let strategy = *strategy;
        self.atomically("force_revoke_strategy", move |vault| {
            vault.require_role(caller, Roles::FORCE_REVOKE_MANAGER)?;
            let params = vault.state.registry.params(&strategy);
            if !params.is_active() {
                return Err(VaultError::StrategyNotActive);
            }
            if params.current_debt != 0 {
                let loss = vault.realize_full_loss(&strategy)?;
                warn!(vault = %vault.address, %strategy, loss, "debt written off on forced revoke");
            }
            vault.deactivate_strategy(&strategy);
            Ok(())
        })
    }

    fn deactivate_strategy(&mut self, strategy: &Address) {
        self.state.registry.deactivate(strategy);
        self.emit(VaultEvent::StrategyChanged {
            strategy: *strategy,
            change_type: StrategyChangeType::Revoked,
        });
        info!(vault = %self.address, %strategy, "strategy revoked");
    }

    /// Sets the cap debt increases for `strategy` may not exceed.
    pub fn update_max_debt_for_strategy(
        &mut self,
        caller: &Address,
        strategy: &Address,
        max_debt: u128,
    ) -> Result<(), VaultError> {
        self.require_role(caller, Roles::MAX_DEBT_MANAGER)?;
        self.state.registry.params_mut(strategy)?.max_debt = max_debt;
        Ok(())
    }

    /// Replaces the default queue. Every member must be active.
    pub fn set_default_queue(&mut self, caller: &Address, queue: Vec<Address>) -> Result<(), VaultError> {
        self.require_role(caller, Roles::QUEUE_MANAGER)?;
        self.state.registry.set_queue(&queue)?;
        self.emit(VaultEvent::UpdateDefaultQueue {
            new_default_queue: queue,
        });
        Ok(())
    }

    /// Forces exits to ignore caller-supplied strategy lists.
    pub fn set_use_default_queue(&mut self, caller: &Address, use_default_queue: bool) -> Result<(), VaultError> {
        self.require_role(caller, Roles::QUEUE_MANAGER)?;
        self.state.use_default_queue = use_default_queue;
        self.emit(VaultEvent::UpdateUseDefaultQueue { use_default_queue });
        Ok(())
    }
}
