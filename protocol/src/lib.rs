// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Protocol: Vault Accounting Engine
//!
//! Strata pools a single asset from many depositors, hands out fungible
//! shares against it, and lends the pool to pluggable yield strategies.
//! The hard part is not moving tokens around; it is keeping the books
//! honest while strategies under-deliver, accountants charge fees, and
//! profits are released slowly enough that nobody can sandwich a report.
//!
//! ## Architecture
//!
//! Leaf-first:
//!
//! - **shares**: share balances, allowances and share/asset conversion.
//! - **roles**: capability flags and the two-phase role manager handoff.
//! - **registry**: per-strategy parameters and the bounded default queue.
//! - **unlock**: the linear release schedule of the profit buffer.
//! - **fees**: accountant fee math and the protocol fee carve-out.
//! - **vault**: the aggregate tying it together: deposits and exits,
//!   debt rebalancing, strategy reports, governance and shutdown.
//!
//! Around it sit the host primitives the engine runs on (**address**,
//! **ledger**, **clock**), the **collaborators** traits for strategies,
//! accountants, fee sources and limit modules, plus **events**,
//! **error**, **config**, **math** and **logging**.
//!
//! ## Design Philosophy
//!
//! 1. Every mutating call is all-or-nothing. A failed call leaves no trace.
//! 2. Internal books are updated before any collaborator is called, and
//!    whatever a collaborator claims is re-measured afterwards.
//! 3. Arithmetic never wraps. Overflow is an error, not a surprise.
//! 4. If it touches money, it has tests. Plural.

pub mod address;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod logging;
pub mod math;
pub mod registry;
pub mod roles;
pub mod shares;
pub mod unlock;
pub mod vault;

pub use address::Address;
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use collaborators::{
    Accountant, AccountantReport, DepositLimitModule, NoProtocolFee, ProtocolFeeConfig,
    ProtocolFeeSource, ReportContext, Strategy, WithdrawLimitModule,
};
pub use config::VaultConfig;
pub use error::{ErrorKind, ExternalError, VaultError};
pub use events::{StrategyChangeType, VaultEvent};
pub use ledger::{AssetLedger, LedgerError, SharedLedger};
pub use registry::StrategyParams;
pub use roles::Roles;
pub use vault::{ExitOptions, Vault, VaultEnv};
