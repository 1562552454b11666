//! # Strata Vault Collaborators
//!
//! Concrete parties a Strata vault works with. The vault engine in
//! `strata-protocol` only knows them through traits; these are the
//! implementations a deployment (or a test harness) actually wires in:
//!
//! - **Accountant**: management and performance fees per strategy, loss
//!   refunds out of the accountant's own balance, and a two-step fee
//!   manager handoff.
//! - **Factory**: deploys vaults at derived addresses and acts as the
//!   protocol fee source for everything it deployed.
//! - **Strategies**: a reference strategy whose behavior can be bent at
//!   will: capped capacity, locked funds, lossy or generous withdrawals,
//!   partial absorption of deposits.
//! - **Limits**: fixed deposit and withdraw limit modules.
//!
//! ## Design Principles
//!
//! 1. Every collaborator keeps its funds on the shared asset ledger, so a
//!    vault call that reverts takes their asset movements back with it.
//! 2. Governance failures are typed errors, never panics.
//! 3. Anything that crosses into the vault is converted to an
//!    `ExternalError` at the trait boundary.

pub mod accountant;
pub mod factory;
pub mod limits;
pub mod strategies;

pub use accountant::{AccountantError, Fee, FeeAccountant};
pub use factory::{FactoryError, VaultFactory};
pub use limits::{StaticDepositLimit, StaticWithdrawLimit};
pub use strategies::MockStrategy;
