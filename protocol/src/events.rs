//! # Vault Events
//!
//! Every state change a vault commits is announced with a [`VaultEvent`].
//! Indexers and keepers rely on the exact field sets, so the serialized
//! form uses the camelCase names integrators already know
//! (`currentDebt`, `totalFees`, ...).
//!
//! Events emitted during a call that later fails are discarded together
//! with the rest of that call's effects.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::roles::Roles;

/// Whether a strategy joined or left the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyChangeType {
    /// Registered through `add_strategy`.
    Added,
    /// Removed through `revoke_strategy` or `force_revoke_strategy`.
    Revoked,
}

/// An event emitted by a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum VaultEvent {
    #[serde(rename_all = "camelCase")]
    Deposit {
        sender: Address,
        owner: Address,
        assets: u128,
        shares: u128,
    },
    #[serde(rename_all = "camelCase")]
    Withdraw {
        sender: Address,
        receiver: Address,
        owner: Address,
        assets: u128,
        shares: u128,
    },
    #[serde(rename_all = "camelCase")]
    Transfer {
        sender: Address,
        receiver: Address,
        value: u128,
    },
    #[serde(rename_all = "camelCase")]
    Approval {
        owner: Address,
        spender: Address,
        value: u128,
    },
    #[serde(rename_all = "camelCase")]
    StrategyChanged {
        strategy: Address,
        change_type: StrategyChangeType,
    },
    #[serde(rename_all = "camelCase")]
    StrategyReported {
        strategy: Address,
        gain: u128,
        loss: u128,
        current_debt: u128,
        total_fees: u128,
        total_refunds: u128,
        protocol_fees: u128,
    },
    #[serde(rename_all = "camelCase")]
    DebtUpdated {
        strategy: Address,
        current_debt: u128,
        new_debt: u128,
    },
    #[serde(rename_all = "camelCase")]
    DebtPurchased { strategy: Address, amount: u128 },
    #[serde(rename_all = "camelCase")]
    RoleSet { account: Address, role: Roles },
    #[serde(rename_all = "camelCase")]
    UpdateRoleManager { role_manager: Address },
    #[serde(rename_all = "camelCase")]
    UpdateAccountant { accountant: Address },
    #[serde(rename_all = "camelCase")]
    UpdateDefaultQueue { new_default_queue: Vec<Address> },
    #[serde(rename_all = "camelCase")]
    UpdateUseDefaultQueue { use_default_queue: bool },
    #[serde(rename_all = "camelCase")]
    UpdateDepositLimit { deposit_limit: u128 },
    #[serde(rename_all = "camelCase")]
    UpdateDepositLimitModule { deposit_limit_module: Address },
    #[serde(rename_all = "camelCase")]
    UpdateWithdrawLimitModule { withdraw_limit_module: Address },
    #[serde(rename_all = "camelCase")]
    UpdateMinimumTotalIdle { minimum_total_idle: u128 },
    #[serde(rename_all = "camelCase")]
    UpdateProfitMaxUnlockTime { profit_max_unlock_time: u64 },
    Shutdown,
}

impl VaultEvent {
    /// The variant name, e.g. `"DebtUpdated"`.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::Deposit { .. } => "Deposit",
            VaultEvent::Withdraw { .. } => "Withdraw",
            VaultEvent::Transfer { .. } => "Transfer",
            VaultEvent::Approval { .. } => "Approval",
            VaultEvent::StrategyChanged { .. } => "StrategyChanged",
            VaultEvent::StrategyReported { .. } => "StrategyReported",
            VaultEvent::DebtUpdated { .. } => "DebtUpdated",
            VaultEvent::DebtPurchased { .. } => "DebtPurchased",
            VaultEvent::RoleSet { .. } => "RoleSet",
            VaultEvent::UpdateRoleManager { .. } => "UpdateRoleManager",
            VaultEvent::UpdateAccountant { .. } => "UpdateAccountant",
            VaultEvent::UpdateDefaultQueue { .. } => "UpdateDefaultQueue",
            VaultEvent::UpdateUseDefaultQueue { .. } => "UpdateUseDefaultQueue",
            VaultEvent::UpdateDepositLimit { .. } => "UpdateDepositLimit",
            VaultEvent::UpdateDepositLimitModule { .. } => "UpdateDepositLimitModule",
            VaultEvent::UpdateWithdrawLimitModule { .. } => "UpdateWithdrawLimitModule",
            VaultEvent::UpdateMinimumTotalIdle { .. } => "UpdateMinimumTotalIdle",
            VaultEvent::UpdateProfitMaxUnlockTime { .. } => "UpdateProfitMaxUnlockTime",
            VaultEvent::Shutdown => "Shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_serialize_with_camel_case_fields() {
        let event = VaultEvent::StrategyReported {
            strategy: Address::from_label("strategy"),
            gain: 10,
            loss: 0,
            current_debt: 110,
            total_fees: 1,
            total_refunds: 0,
            protocol_fees: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "StrategyReported");
        assert_eq!(json["currentDebt"], 110);
        assert_eq!(json["totalFees"], 1);
        assert_eq!(json["protocolFees"], 0);
    }

    #[test]
    fn change_type_uses_upper_case() {
        let event = VaultEvent::StrategyChanged {
            strategy: Address::from_label("strategy"),
            change_type: StrategyChangeType::Revoked,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["changeType"], "REVOKED");
        assert_eq!(event.name(), "StrategyChanged");
    }

    #[test]
    fn role_set_carries_the_raw_mask() {
        let event = VaultEvent::RoleSet {
            account: Address::from_label("bunny"),
            role: Roles::EMERGENCY_MANAGER | Roles::DEBT_MANAGER,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["role"], 8256);
    }
}
