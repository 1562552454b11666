//! # Fee Assessment
//!
//! Two layers of fees apply to every report:
//!
//! 1. **Accountant fees**: a management fee pro-rated over the time since
//!    the strategy's last report and annualized over its debt, plus a
//!    performance fee on the gain. Together they never exceed 75% of the
//!    gain when there is one. Accountants compute this with
//!    [`accountant_fees`].
//! 2. **Protocol fees**: a cut of the accountant fees owed to the protocol
//!    recipient. It is carved out of the accountant fees, not added on top.
//!
//! Both are paid by minting shares, never by moving assets.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::collaborators::ProtocolFeeConfig;
use crate::config::{MAX_BPS, MAX_FEE_SHARE_OF_GAIN_BPS, SECS_PER_YEAR};
use crate::error::VaultError;
use crate::math::{self, mul_div, Rounding};

/// Fee rates an accountant charges a strategy, in basis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    /// Annual fee on the strategy's debt.
    pub management_fee: u16,
    /// Fee on reported gain.
    pub performance_fee: u16,
}

/// Accountant fees for a report covering `elapsed` seconds on
/// `current_debt`, with `gain` realized.
pub fn accountant_fees(
    schedule: &FeeSchedule,
    current_debt: u128,
    elapsed: u64,
    gain: u128,
) -> Result<u128, VaultError> {
    let management = mul_div(
        current_debt,
        u128::from(elapsed) * u128::from(schedule.management_fee),
        MAX_BPS * u128::from(SECS_PER_YEAR),
        Rounding::Down,
    )?;
    if gain == 0 {
        return Ok(management);
    }
    let performance = mul_div(
        gain,
        u128::from(schedule.performance_fee),
        MAX_BPS,
        Rounding::Down,
    )?;
    let total = math::add(management, performance, "accountant fees")?;
    let cap = mul_div(gain, MAX_FEE_SHARE_OF_GAIN_BPS, MAX_BPS, Rounding::Down)?;
    Ok(total.min(cap))
}

/// How a report's fees divide between accountant and protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSplit {
    /// Fees for the accountant, in assets.
    pub accountant_fees: u128,
    /// Fees for the protocol, in assets.
    pub protocol_fees: u128,
    /// Where protocol fee shares go.
    pub protocol_fee_recipient: Address,
}

/// Carves the protocol's cut out of `total_fees`.
///
/// A missing recipient means nothing is carved out. The rate is clamped to
/// 100% so a misconfigured source cannot mint more than the fees themselves.
pub fn split_protocol_fees(
    total_fees: u128,
    config: &ProtocolFeeConfig,
) -> Result<FeeSplit, VaultError> {
    if total_fees == 0 || config.fee_bps == 0 || config.fee_recipient.is_zero() {
        return Ok(FeeSplit {
            accountant_fees: total_fees,
            ..FeeSplit::default()
        });
    }
    let bps = u128::from(config.fee_bps).min(MAX_BPS);
    let protocol_fees = mul_div(total_fees, bps, MAX_BPS, Rounding::Down)?;
    Ok(FeeSplit {
        accountant_fees: total_fees - protocol_fees,
        protocol_fees,
        protocol_fee_recipient: config.fee_recipient,
    })
}

/// The part of an offered refund the vault can actually collect.
pub fn collectable_refund(offered: u128, accountant_balance: u128, allowance: u128) -> u128 {
    offered.min(accountant_balance).min(allowance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn management_fee_accrues_over_a_year() {
        let schedule = FeeSchedule {
            management_fee: 100,
            performance_fee: 0,
        };
        let fees = accountant_fees(&schedule, 1_000_000, SECS_PER_YEAR, 0).unwrap();
        assert_eq!(fees, 10_000);
        let half = accountant_fees(&schedule, 1_000_000, SECS_PER_YEAR / 2, 0).unwrap();
        assert_eq!(half, 5_000);
    }

    #[test]
    fn performance_fee_is_a_share_of_gain() {
        let schedule = FeeSchedule {
            management_fee: 0,
            performance_fee: 1_000,
        };
        assert_eq!(accountant_fees(&schedule, 0, 0, 50_000).unwrap(), 5_000);
    }

    #[test]
    fn combined_fees_are_capped_at_three_quarters_of_gain() {
        let schedule = FeeSchedule {
            management_fee: 5_000,
            performance_fee: 5_000,
        };
        let debt = 1_000_000u128;
        let gain = debt / 2;
        // Uncapped: 500_000 management + 250_000 performance.
        let fees = accountant_fees(&schedule, debt, SECS_PER_YEAR, gain).unwrap();
        assert_eq!(fees, gain * 3 / 4);
    }

    #[test]
    fn loss_reports_pay_management_only() {
        let schedule = FeeSchedule {
            management_fee: 200,
            performance_fee: 5_000,
        };
        let fees = accountant_fees(&schedule, 1_000_000, SECS_PER_YEAR, 0).unwrap();
        assert_eq!(fees, 20_000);
    }

    #[test]
    fn protocol_cut_is_carved_out() {
        let config = ProtocolFeeConfig {
            fee_bps: 2_500,
            fee_recipient: Address::from_label("treasury"),
        };
        let split = split_protocol_fees(1_000, &config).unwrap();
        assert_eq!(split.protocol_fees, 250);
        assert_eq!(split.accountant_fees, 750);
    }

    #[test]
    fn protocol_cut_needs_a_recipient() {
        let config = ProtocolFeeConfig {
            fee_bps: 2_500,
            fee_recipient: Address::ZERO,
        };
        let split = split_protocol_fees(1_000, &config).unwrap();
        assert_eq!(split.protocol_fees, 0);
        assert_eq!(split.accountant_fees, 1_000);
    }

    #[test]
    fn protocol_cut_is_clamped_to_the_whole_fee() {
        let config = ProtocolFeeConfig {
            fee_bps: u16::MAX,
            fee_recipient: Address::from_label("treasury"),
        };
        let split = split_protocol_fees(1_000, &config).unwrap();
        assert_eq!(split.protocol_fees, 1_000);
        assert_eq!(split.accountant_fees, 0);
    }

    #[test]
    fn refunds_are_bounded_by_balance_and_allowance() {
        assert_eq!(collectable_refund(100, 40, 1_000), 40);
        assert_eq!(collectable_refund(100, 1_000, 60), 60);
        assert_eq!(collectable_refund(100, 1_000, 1_000), 100);
    }
}
