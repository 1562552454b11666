//! Fixed deposit and withdraw limit modules.

use parking_lot::RwLock;
use strata_protocol::{Address, DepositLimitModule, WithdrawLimitModule};

/// Lets every receiver deposit up to the same amount.
#[derive(Debug)]
pub struct StaticDepositLimit {
    address: Address,
    limit: RwLock<u128>,
}

impl StaticDepositLimit {
    /// A module named by `label` allowing `limit`.
    pub fn new(label: &str, limit: u128) -> Self {
        Self {
            address: Address::from_label(label),
            limit: RwLock::new(limit),
        }
    }

    /// Changes the limit.
    pub fn set_limit(&self, limit: u128) {
        *self.limit.write() = limit;
    }
}

impl DepositLimitModule for StaticDepositLimit {
    fn address(&self) -> Address {
        self.address
    }

    fn available_deposit_limit(&self, _receiver: &Address) -> u128 {
        *self.limit.read()
    }
}

/// Lets every owner withdraw up to the same amount, whatever the loss
/// tolerance or strategy list.
#[derive(Debug)]
pub struct StaticWithdrawLimit {
    address: Address,
    limit: RwLock<u128>,
}

impl StaticWithdrawLimit {
    /// A module named by `label` allowing `limit`.
    pub fn new(label: &str, limit: u128) -> Self {
        Self {
            address: Address::from_label(label),
            limit: RwLock::new(limit),
        }
    }

    /// Changes the limit.
    pub fn set_limit(&self, limit: u128) {
        *self.limit.write() = limit;
    }
}

impl WithdrawLimitModule for StaticWithdrawLimit {
    fn address(&self) -> Address {
        self.address
    }

    fn available_withdraw_limit(&self, _owner: &Address, _max_loss: u16, _strategies: &[Address]) -> u128 {
        *self.limit.read()
    }
}
