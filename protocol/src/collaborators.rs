//! # Collaborator Interfaces
//!
//! The vault delegates yield generation, fee policy, protocol fee lookup and
//! deposit/withdraw limits to outside parties. They are modelled as traits
//! and held as `Arc<dyn Trait>`.
//!
//! None of these parties are trusted. Amounts they claim to have moved are
//! ignored; the vault measures its own asset balance before and after every
//! call instead. Implementations that move the asset do so on the shared
//! [`AssetLedger`](crate::ledger::AssetLedger) and must take the ledger lock
//! themselves, since the vault never holds it across a call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::clock::Timestamp;
use crate::error::ExternalError;
use crate::registry::StrategyParams;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A yield source the vault lends its idle assets to.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Identity of the strategy.
    fn address(&self) -> Address;

    /// The asset the strategy accepts. Must match the vault's.
    fn asset(&self) -> Address;

    /// Assets the strategy holds in total.
    fn total_assets(&self) -> u128;

    /// Assets the strategy holds on behalf of `owner`.
    fn assets_of(&self, owner: &Address) -> u128;

    /// Assets `receiver` could still deposit.
    fn max_deposit(&self, receiver: &Address) -> u128;

    /// Assets `owner` could withdraw right now.
    fn max_withdraw(&self, owner: &Address) -> u128;

    /// Pulls up to `assets` from `receiver` (against `receiver`'s allowance
    /// on the asset ledger) and credits `receiver`'s position.
    fn deposit(&self, assets: u128, receiver: &Address) -> Result<u128, ExternalError>;

    /// Sends up to `assets` to `receiver`, debiting `owner`'s position.
    fn withdraw(&self, assets: u128, receiver: &Address, owner: &Address) -> Result<u128, ExternalError>;

    /// Reassigns `assets` worth of `from`'s position to `to` without moving
    /// the underlying funds.
    fn transfer_position(&self, from: &Address, to: &Address, assets: u128) -> Result<(), ExternalError>;
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

/// Everything an accountant may consult when pricing a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    /// The reporting vault.
    pub vault: Address,
    /// The strategy being reported.
    pub strategy: Address,
    /// Gain since the last report.
    pub gain: u128,
    /// Loss since the last report.
    pub loss: u128,
    /// Strategy parameters as they stood before this report.
    pub params: StrategyParams,
    /// Time of the report.
    pub now: Timestamp,
}

/// What an accountant charges and reimburses for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountantReport {
    /// Fees, in assets, to be paid in newly minted shares.
    pub total_fees: u128,
    /// Assets the accountant offers to send to the vault.
    pub total_refunds: u128,
}

/// Fee policy for a vault.
///
/// Refunds are offered, not sent: the accountant approves the vault on the
/// asset ledger and the vault pulls what the approval and the accountant's
/// balance allow.
pub trait Accountant: Send + Sync + fmt::Debug {
    /// Identity of the accountant. Fee shares are minted here.
    fn address(&self) -> Address;

    /// Prices a strategy report.
    fn report(&self, ctx: &ReportContext) -> Result<AccountantReport, ExternalError>;
}

// ---------------------------------------------------------------------------
// Protocol Fees
// ---------------------------------------------------------------------------

/// Protocol-wide cut of accountant fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolFeeConfig {
    /// Share of accountant fees owed to the protocol, in basis points.
    pub fee_bps: u16,
    /// Where protocol fee shares are minted.
    pub fee_recipient: Address,
}

/// Source of the protocol fee configuration, usually the deploying factory.
pub trait ProtocolFeeSource: Send + Sync + fmt::Debug {
    /// The configuration that applies to `vault`.
    fn protocol_fee_config(&self, vault: &Address) -> ProtocolFeeConfig;
}

/// A fee source that never charges. For vaults deployed outside a factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProtocolFee;

impl ProtocolFeeSource for NoProtocolFee {
    fn protocol_fee_config(&self, _vault: &Address) -> ProtocolFeeConfig {
        ProtocolFeeConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Limit Modules
// ---------------------------------------------------------------------------

/// Replaces the vault's fixed deposit limit with custom logic.
pub trait DepositLimitModule: Send + Sync + fmt::Debug {
    /// Identity of the module.
    fn address(&self) -> Address;

    /// Assets `receiver` may deposit right now.
    fn available_deposit_limit(&self, receiver: &Address) -> u128;
}

/// Caps what an owner may withdraw.
pub trait WithdrawLimitModule: Send + Sync + fmt::Debug {
    /// Identity of the module.
    fn address(&self) -> Address;

    /// Assets `owner` may withdraw right now with the given loss tolerance
    /// and strategy list.
    fn available_withdraw_limit(&self, owner: &Address, max_loss: u16, strategies: &[Address]) -> u128;
}
