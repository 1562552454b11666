//! # Fee Accountant
//!
//! Prices strategy reports for one or more vaults sharing an asset.
//!
//! ## Fees
//!
//! Each strategy is charged by its own [`Fee`] schedule, falling back to
//! the accountant's default. The management fee accrues on the strategy's
//! debt over the time since its last report; the performance fee is a cut
//! of the reported gain. Together they never exceed 75% of a gain.
//!
//! ## Refunds
//!
//! A strategy's refund ratio is the fraction of a loss the accountant pays
//! back out of its own balance. In flexible mode the ratio applies to gains
//! as well, topping up good reports. The accountant only offers a refund by
//! approving the vault on the asset ledger; the vault decides how much of
//! the offer it can actually pull.
//!
//! ## Governance
//!
//! The fee manager sets schedules and receives distributed fee shares. It
//! hands over in two steps: `commit_fee_manager` names a successor and
//! `apply_fee_manager` puts them in charge.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strata_protocol::config::{MANAGEMENT_FEE_THRESHOLD, MAX_BPS, PERFORMANCE_FEE_THRESHOLD};
use strata_protocol::error::{ExternalError, VaultError};
use strata_protocol::fees::{accountant_fees, FeeSchedule};
use strata_protocol::ledger::SharedLedger;
use strata_protocol::math::{mul_div, Rounding};
use strata_protocol::{Accountant, AccountantReport, Address, ReportContext, Vault};
use thiserror::Error;
use tracing::info;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from accountant governance and pricing.
#[derive(Debug, Error)]
pub enum AccountantError {
    /// The caller is not the fee manager.
    #[error("not fee manager")]
    NotFeeManager,

    /// Only the committed successor may take over.
    #[error("not future fee manager")]
    NotFutureFeeManager,

    /// `apply_fee_manager` was called with no successor committed.
    #[error("future fee manager != zero address")]
    NoFutureFeeManager,

    /// Performance fee above [`PERFORMANCE_FEE_THRESHOLD`].
    #[error("exceeds performance fee threshold")]
    PerformanceFeeTooHigh,

    /// Management fee above [`MANAGEMENT_FEE_THRESHOLD`].
    #[error("exceeds management fee threshold")]
    ManagementFeeTooHigh,

    /// Refund ratio above 100%.
    #[error("refund ratio above 100%")]
    RefundRatioTooHigh,

    /// The vault refused a share transfer.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fee schedule and refund policy for one strategy, in basis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    /// Annual fee on debt.
    pub management_fee: u16,
    /// Cut of reported gains.
    pub performance_fee: u16,
    /// Fraction of losses paid back.
    pub refund_ratio: u16,
}

impl Fee {
    fn schedule(&self) -> FeeSchedule {
        FeeSchedule {
            management_fee: self.management_fee,
            performance_fee: self.performance_fee,
        }
    }
}

#[derive(Debug)]
struct AccountantState {
    fee_manager: Address,
    future_fee_manager: Option<Address>,
    default_fee: Fee,
    custom_fees: HashMap<Address, Fee>,
    flexible: bool,
}

/// A fee accountant holding its refund reserve on the asset ledger.
#[derive(Debug)]
pub struct FeeAccountant {
    address: Address,
    ledger: SharedLedger,
    state: RwLock<AccountantState>,
}

impl FeeAccountant {
    /// Creates an accountant named by `label`, managed by `fee_manager`,
    /// charging nothing until configured.
    pub fn new(label: &str, ledger: &SharedLedger, fee_manager: Address) -> Self {
        Self {
            address: Address::from_label(label),
            ledger: ledger.clone(),
            state: RwLock::new(AccountantState {
                fee_manager,
                future_fee_manager: None,
                default_fee: Fee::default(),
                custom_fees: HashMap::new(),
                flexible: false,
            }),
        }
    }

    /// Also refunds on gains.
    pub fn flexible(self) -> Self {
        self.state.write().flexible = true;
        self
    }

    /// The accountant's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The current fee manager.
    pub fn fee_manager(&self) -> Address {
        self.state.read().fee_manager
    }

    /// The committed successor, or zero.
    pub fn future_fee_manager(&self) -> Address {
        self.state.read().future_fee_manager.unwrap_or(Address::ZERO)
    }

    /// The schedule applied to `strategy`.
    pub fn fee_for(&self, strategy: &Address) -> Fee {
        let state = self.state.read();
        state
            .custom_fees
            .get(strategy)
            .copied()
            .unwrap_or(state.default_fee)
    }

    fn require_fee_manager(&self, caller: &Address) -> Result<(), AccountantError> {
        if *caller == self.state.read().fee_manager {
            Ok(())
        } else {
            Err(AccountantError::NotFeeManager)
        }
    }

    fn validate(fee: &Fee) -> Result<(), AccountantError> {
        if fee.management_fee > MANAGEMENT_FEE_THRESHOLD {
            return Err(AccountantError::ManagementFeeTooHigh);
        }
        if fee.performance_fee > PERFORMANCE_FEE_THRESHOLD {
            return Err(AccountantError::PerformanceFeeTooHigh);
        }
        if u128::from(fee.refund_ratio) > MAX_BPS {
            return Err(AccountantError::RefundRatioTooHigh);
        }
        Ok(())
    }

    fn update_fee(
        &self,
        caller: &Address,
        strategy: &Address,
        change: impl FnOnce(&mut Fee),
    ) -> Result<(), AccountantError> {
        self.require_fee_manager(caller)?;
        let mut fee = self.fee_for(strategy);
        change(&mut fee);
        Self::validate(&fee)?;
        self.state.write().custom_fees.insert(*strategy, fee);
        info!(accountant = %self.address, %strategy, ?fee, "strategy fee updated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fee Management
    // -----------------------------------------------------------------------

    /// Sets the schedule for strategies without their own.
    pub fn set_default_fee(&self, caller: &Address, fee: Fee) -> Result<(), AccountantError> {
        self.require_fee_manager(caller)?;
        Self::validate(&fee)?;
        self.state.write().default_fee = fee;
        Ok(())
    }

    /// Sets `strategy`'s management fee.
    pub fn set_management_fee(&self, caller: &Address, strategy: &Address, bps: u16) -> Result<(), AccountantError> {
        self.update_fee(caller, strategy, |fee| fee.management_fee = bps)
    }

    /// Sets `strategy`'s performance fee.
    pub fn set_performance_fee(&self, caller: &Address, strategy: &Address, bps: u16) -> Result<(), AccountantError> {
        self.update_fee(caller, strategy, |fee| fee.performance_fee = bps)
    }

    /// Sets the fraction of `strategy`'s losses paid back.
    pub fn set_refund_ratio(&self, caller: &Address, strategy: &Address, bps: u16) -> Result<(), AccountantError> {
        self.update_fee(caller, strategy, |fee| fee.refund_ratio = bps)
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    /// Names `next` as the successor fee manager.
    pub fn commit_fee_manager(&self, caller: &Address, next: Address) -> Result<(), AccountantError> {
        self.require_fee_manager(caller)?;
        self.state.write().future_fee_manager = Some(next).filter(|a| !a.is_zero());
        Ok(())
    }

    /// Puts the committed successor in charge. Callable by the current
    /// manager or the successor.
    pub fn apply_fee_manager(&self, caller: &Address) -> Result<(), AccountantError> {
        let mut state = self.state.write();
        let next = state.future_fee_manager.ok_or(AccountantError::NoFutureFeeManager)?;
        if *caller != state.fee_manager && *caller != next {
            return Err(AccountantError::NotFutureFeeManager);
        }
        state.fee_manager = next;
        state.future_fee_manager = None;
        info!(accountant = %self.address, fee_manager = %next, "fee manager changed");
        Ok(())
    }

    /// Sends every share of `vault` the accountant holds to the fee
    /// manager. Returns the shares sent.
    pub fn distribute(&self, vault: &mut Vault) -> Result<u128, AccountantError> {
        let shares = vault.balance_of(&self.address);
        if shares == 0 {
            return Ok(0);
        }
        let fee_manager = self.fee_manager();
        vault.transfer(&self.address, &fee_manager, shares)?;
        info!(accountant = %self.address, vault = %vault.address(), shares, "fees distributed");
        Ok(shares)
    }

    fn price(&self, ctx: &ReportContext) -> Result<AccountantReport, VaultError> {
        let fee = self.fee_for(&ctx.strategy);
        let elapsed = ctx.now.saturating_sub(ctx.params.last_report);
        let total_fees = accountant_fees(&fee.schedule(), ctx.params.current_debt, elapsed, ctx.gain)?;

        let ratio = u128::from(fee.refund_ratio);
        let total_refunds = if ctx.loss > 0 {
            mul_div(ctx.loss, ratio, MAX_BPS, Rounding::Down)?
        } else if ctx.gain > 0 && self.state.read().flexible {
            mul_div(ctx.gain, ratio, MAX_BPS, Rounding::Down)?
        } else {
            0
        };
        Ok(AccountantReport {
            total_fees,
            total_refunds,
        })
    }
}

impl Accountant for FeeAccountant {
    fn address(&self) -> Address {
        self.address
    }

    fn report(&self, ctx: &ReportContext) -> Result<AccountantReport, ExternalError> {
        let report = self
            .price(ctx)
            .map_err(|err| ExternalError::reverted(self.address, err.to_string()))?;
        if report.total_refunds > 0 {
            self.ledger
                .write()
                .approve(&self.address, &ctx.vault, report.total_refunds);
        }
        Ok(report)
    }
}
