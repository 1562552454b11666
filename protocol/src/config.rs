//! # Vault Configuration & Constants
//!
//! Every magic number the accounting engine relies on lives here. Fee math,
//! queue bounds and unlock windows all read from this module, so a reviewer
//! auditing a number only has one place to look.
//!
//! The second half of the module holds [`VaultConfig`], the one-shot
//! parameter set a vault is initialized with.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::VaultError;
use crate::roles::Roles;

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Accounting API version reported by every vault.
pub const API_VERSION: &str = "3.0.1";

// ---------------------------------------------------------------------------
// Basis Points & Fixed Point
// ---------------------------------------------------------------------------

/// 100% expressed in basis points.
pub const MAX_BPS: u128 = 10_000;

/// Extended precision used for the profit unlocking rate. The rate is stored
/// as shares-per-second multiplied by this factor so that small buffers
/// spread over long windows do not round down to zero.
pub const MAX_BPS_EXTENDED: u128 = 1_000_000_000_000;

// ---------------------------------------------------------------------------
// Strategy Queue
// ---------------------------------------------------------------------------

/// Maximum number of strategies in the default withdrawal queue.
pub const MAX_QUEUE: usize = 10;

/// Largest asset precision whose whole unit still fits in a `u128`.
pub const MAX_DECIMALS: u8 = 38;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Seconds in a day.
pub const SECS_PER_DAY: u64 = 86_400;

/// Seconds in a week. The customary profit unlock window.
pub const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;

/// Seconds in a (Gregorian average) year: 365.2425 days.
pub const SECS_PER_YEAR: u64 = 31_556_952;

/// Upper bound for `profit_max_unlock_time`. Locking profit for longer than
/// a year would effectively hide it from depositors.
pub const MAX_PROFIT_UNLOCK_TIME: u64 = SECS_PER_YEAR;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Hard cap on the protocol's cut of accountant fees, in basis points.
pub const MAX_PROTOCOL_FEE_BPS: u16 = 5_000;

/// Highest performance fee an accountant may charge, in basis points.
pub const PERFORMANCE_FEE_THRESHOLD: u16 = 5_000;

/// Highest annual management fee an accountant may charge, in basis points.
pub const MANAGEMENT_FEE_THRESHOLD: u16 = 10_000;

/// Combined accountant fees may never exceed this share of a report's gain.
pub const MAX_FEE_SHARE_OF_GAIN_BPS: u128 = 7_500;

// ---------------------------------------------------------------------------
// Vault Configuration
// ---------------------------------------------------------------------------

/// Parameters supplied once, at vault initialization.
///
/// Everything else (limits, accountant, queue) is set afterwards through
/// role-gated setters, so this stays deliberately small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Human-readable share token name.
    pub name: String,
    /// Share token ticker.
    pub symbol: String,
    /// Account that governs role assignment.
    pub role_manager: Address,
    /// Window over which reported profit is released to holders, in seconds.
    pub profit_max_unlock_time: u64,
    /// Capabilities granted to the role manager at initialization.
    #[serde(default = "Roles::all")]
    pub role_manager_roles: Roles,
}

impl VaultConfig {
    /// Creates a config with a one-week unlock window and every role granted
    /// to the role manager.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, role_manager: Address) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            role_manager,
            profit_max_unlock_time: SECS_PER_WEEK,
            role_manager_roles: Roles::all(),
        }
    }

    /// Overrides the profit unlock window.
    pub fn with_profit_max_unlock_time(mut self, seconds: u64) -> Self {
        self.profit_max_unlock_time = seconds;
        self
    }

    /// Overrides the role set granted to the role manager.
    pub fn with_role_manager_roles(mut self, roles: Roles) -> Self {
        self.role_manager_roles = roles;
        self
    }

    /// Parses a config from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, VaultError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| VaultError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants `initialize` relies on.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.role_manager.is_zero() {
            return Err(VaultError::ZeroAddress {
                what: "role manager",
            });
        }
        if self.profit_max_unlock_time > MAX_PROFIT_UNLOCK_TIME {
            return Err(VaultError::ProfitUnlockTimeTooLong);
        }
        if self.name.is_empty() || self.symbol.is_empty() {
            return Err(VaultError::InvalidConfig(
                "name and symbol must be non-empty".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
