//! # Profit Unlocking
//!
//! Reported profit is not handed to holders at once. The vault mints shares
//! for it to itself and lets them dissolve linearly over
//! `profit_max_unlock_time`. Burning a self-held share raises the price of
//! every other share, so profit shows up in the share price gradually and a
//! depositor cannot sandwich a report to capture it.
//!
//! This module only tracks the schedule. The buffer itself is the vault's
//! own balance in the [`ShareLedger`](crate::shares::ShareLedger).
//!
//! ## Rate
//!
//! `profit_unlocking_rate` is shares per second scaled by
//! [`MAX_BPS_EXTENDED`]. Every new report restarts the window over the whole
//! outstanding buffer.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::config::MAX_BPS_EXTENDED;
use crate::error::VaultError;
use crate::math::{mul_div, Rounding};

/// Release schedule of the profit buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitUnlock {
    /// Length of a full unlock window in seconds. Zero disables locking.
    pub profit_max_unlock_time: u64,
    /// When the buffer will be fully released. Zero when nothing is locked.
    pub full_profit_unlock_date: Timestamp,
    /// Shares released per second, scaled by `MAX_BPS_EXTENDED`.
    pub profit_unlocking_rate: u128,
    /// Last time released shares were burned.
    pub last_profit_update: Timestamp,
}

impl ProfitUnlock {
    /// A schedule with nothing locked.
    pub fn new(profit_max_unlock_time: u64) -> Self {
        Self {
            profit_max_unlock_time,
            ..Self::default()
        }
    }

    /// How many of the `buffer` shares have unlocked by `now` but are still
    /// held by the vault.
    pub fn unlocked_shares(&self, now: Timestamp, buffer: u128) -> u128 {
        if self.full_profit_unlock_date > now {
            let elapsed = u128::from(now.saturating_sub(self.last_profit_update));
            // Only fails when the result would exceed u128, i.e. the buffer.
            mul_div(
                self.profit_unlocking_rate,
                elapsed,
                MAX_BPS_EXTENDED,
                Rounding::Down,
            )
            .map(|released| released.min(buffer))
            .unwrap_or(buffer)
        } else if self.full_profit_unlock_date != 0 {
            buffer
        } else {
            0
        }
    }

    /// Records that the unlocked shares were burned at `now`.
    pub fn mark_released(&mut self, now: Timestamp) {
        if self.full_profit_unlock_date > now {
            self.last_profit_update = now;
        } else {
            self.profit_unlocking_rate = 0;
            self.full_profit_unlock_date = 0;
        }
    }

    /// Restarts the window over `total_locked` shares.
    pub fn relock(&mut self, total_locked: u128, now: Timestamp) -> Result<(), VaultError> {
        if total_locked == 0 || self.profit_max_unlock_time == 0 {
            self.clear();
            return Ok(());
        }
        self.profit_unlocking_rate = mul_div(
            total_locked,
            MAX_BPS_EXTENDED,
            u128::from(self.profit_max_unlock_time),
            Rounding::Down,
        )?;
        self.full_profit_unlock_date = now
            .checked_add(self.profit_max_unlock_time)
            .ok_or(VaultError::Overflow {
                context: "profit unlock date",
            })?;
        self.last_profit_update = now;
        Ok(())
    }

    /// Forgets any schedule. The caller burns the buffer.
    pub fn clear(&mut self) {
        self.profit_unlocking_rate = 0;
        self.full_profit_unlock_date = 0;
    }
}
