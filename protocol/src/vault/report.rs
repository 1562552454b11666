//! Strategy reports.
//!
//! A report turns the difference between what a strategy holds and what it
//! owes into a realized gain or loss, charges fees on it and reshapes the
//! profit buffer:
//!
//! - gains and refunds are locked as newly issued buffer shares;
//! - losses and fees burn buffer shares first, newest first, so existing
//!   holders only take the part the buffer cannot absorb;
//! - fees are paid in freshly minted, immediately unlocked shares.
//!
//! Every report restarts the unlock window over the whole remaining buffer.

use tracing::{debug, info};

use super::Vault;
use crate::address::Address;
use crate::collaborators::{AccountantReport, ReportContext};
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::fees::{collectable_refund, split_protocol_fees, FeeSplit};
use crate::math::{self, Rounding};
use crate::roles::Roles;

/// How a report's gain and loss are determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportMode {
    /// Compare the strategy's holdings with its debt and ask the accountant.
    Assessed,
    /// Write the whole debt off, with no accountant involvement.
    WriteOff,
}

impl Vault {
    /// Realizes `strategy`'s gain or loss since its last report. Returns
    /// `(gain, loss)`.
    pub fn process_report(&mut self, caller: &Address, strategy: &Address) -> Result<(u128, u128), VaultError> {
        let strategy = *strategy;
        self.atomically("process_report", move |vault| {
            vault.require_role(caller, Roles::REPORTING_MANAGER)?;
            vault.report(&strategy, ReportMode::Assessed)
        })
    }

    /// Writes off all of `strategy`'s debt as a loss. Returns the loss.
    pub(super) fn realize_full_loss(&mut self, strategy: &Address) -> Result<u128, VaultError> {
        let (_, loss) = self.report(strategy, ReportMode::WriteOff)?;
        Ok(loss)
    }

    fn report(&mut self, strategy: &Address, mode: ReportMode) -> Result<(u128, u128), VaultError> {
        let params = self.state.registry.params(strategy);
        if !params.is_active() {
            return Err(VaultError::InactiveStrategy);
        }
        self.release_unlocked()?;

        let now = self.now();
        let current_debt = params.current_debt;
        let (gain, loss) = match mode {
            ReportMode::Assessed => {
                let holdings = self.state.registry.handle(strategy)?.assets_of(&self.address);
                if holdings > current_debt {
                    (holdings - current_debt, 0)
                } else {
                    (0, current_debt - holdings)
                }
            }
            ReportMode::WriteOff => (0, current_debt),
        };

        // Fees and refunds, in assets.
        let mut assessed = AccountantReport::default();
        let mut split = FeeSplit::default();
        let mut accountant_address = Address::ZERO;
        if mode == ReportMode::Assessed {
            if let Some(accountant) = self.state.accountant.clone() {
                accountant_address = accountant.address();
                assessed = accountant.report(&ReportContext {
                    vault: self.address,
                    strategy: *strategy,
                    gain,
                    loss,
                    params,
                    now,
                })?;
                if assessed.total_fees > 0 {
                    let config = self.protocol_fees.protocol_fee_config(&self.address);
                    split = split_protocol_fees(assessed.total_fees, &config)?;
                }
                if assessed.total_refunds > 0 {
                    let ledger = self.ledger.read();
                    assessed.total_refunds = collectable_refund(
                        assessed.total_refunds,
                        ledger.balance_of(&accountant_address),
                        ledger.allowance(&accountant_address, &self.address),
                    );
                }
            }
        }
        let total_fees = assessed.total_fees;
        let total_refunds = assessed.total_refunds;

        // Everything priced at the pre-report share price.
        let to_absorb = math::add(loss, total_fees, "loss plus fees")?;
        let mut shares_to_burn = 0;
        let mut accountant_fee_shares = 0;
        let mut protocol_fee_shares = 0;
        if to_absorb > 0 {
            shares_to_burn = self.shares_for(to_absorb, Rounding::Up)?;
            if total_fees > 0 {
                accountant_fee_shares = self.shares_for(split.accountant_fees, Rounding::Down)?;
                protocol_fee_shares = self.shares_for(split.protocol_fees, Rounding::Down)?;
            }
        }

        if total_refunds > 0 {
            let vault = self.address;
            self.ledger
                .write()
                .transfer_from(&vault, &accountant_address, &vault, total_refunds)?;
            self.state.total_idle = math::add(self.state.total_idle, total_refunds, "total idle")?;
        }

        let mut new_debt = current_debt;
        if gain > 0 {
            new_debt = math::add(new_debt, gain, "strategy debt")?;
            self.state.total_debt = math::add(self.state.total_debt, gain, "total debt")?;
        }

        let vault_address = self.address;
        let to_lock = math::add(gain, total_refunds, "gain plus refunds")?;
        let mut newly_locked = 0;
        if to_lock > 0 && self.state.unlock.profit_max_unlock_time != 0 {
            newly_locked = self.issue_shares_for_amount(to_lock, &vault_address)?;
        }

        if loss > 0 {
            new_debt -= loss;
            self.state.total_debt -= loss;
        }

        let mut previously_locked = self.state.shares.balance_of(&vault_address) - newly_locked;
        if shares_to_burn > 0 {
            shares_to_burn = shares_to_burn.min(previously_locked + newly_locked);
            if shares_to_burn > 0 {
                self.burn_shares(&vault_address, shares_to_burn)?;
            }
            let from_new = shares_to_burn.min(newly_locked);
            newly_locked -= from_new;
            previously_locked -= shares_to_burn - from_new;
        }

        if accountant_fee_shares > 0 {
            self.mint_shares(&accountant_address, accountant_fee_shares)?;
        }
        if protocol_fee_shares > 0 {
            self.mint_shares(&split.protocol_fee_recipient, protocol_fee_shares)?;
        }

        self.state
            .unlock
            .relock(previously_locked + newly_locked, now)?;

        let entry = self.state.registry.params_mut(strategy)?;
        entry.current_debt = new_debt;
        entry.last_report = now;

        // When the buffer could not cover everything, fees diluted holders
        // and are reported at what the minted shares are now worth.
        let mut reported_fees = total_fees;
        if total_fees > 0
            && (to_absorb > to_lock || self.state.unlock.profit_max_unlock_time == 0)
        {
            reported_fees = self.assets_for(accountant_fee_shares + protocol_fee_shares, Rounding::Down)?;
        }

        self.emit(VaultEvent::StrategyReported {
            strategy: *strategy,
            gain,
            loss,
            current_debt: new_debt,
            total_fees: reported_fees,
            total_refunds,
            protocol_fees: split.protocol_fees,
        });
        debug!(
            vault = %self.address,
            %strategy,
            shares_burned = shares_to_burn,
            locked = previously_locked + newly_locked,
            "profit buffer updated"
        );
        info!(
            vault = %self.address,
            %strategy,
            gain,
            loss,
            current_debt = new_debt,
            total_fees = reported_fees,
            total_refunds,
            "strategy reported"
        );
        Ok((gain, loss))
    }
}
