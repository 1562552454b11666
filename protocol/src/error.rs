//! # Vault Errors
//!
//! Every way a vault call can fail. The `Display` text of each variant is
//! the revert reason keepers and integrators match on, so treat those
//! strings as part of the public interface.
//!
//! [`VaultError::kind`] buckets the variants into a small [`ErrorKind`]
//! taxonomy for callers that only care about the class of failure (retry
//! with different parameters, give up, escalate to governance).

use std::fmt;

use thiserror::Error;

use crate::address::Address;
use crate::ledger::LedgerError;

// ---------------------------------------------------------------------------
// Collaborator Errors
// ---------------------------------------------------------------------------

/// A failure reported by a strategy, accountant or limit module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    /// The collaborator refused the call.
    #[error("{collaborator} reverted: {reason}")]
    Reverted {
        /// Address of the collaborator.
        collaborator: Address,
        /// Why it refused.
        reason: String,
    },

    /// A transfer the collaborator attempted on the asset ledger failed.
    #[error("asset transfer failed: {0}")]
    Ledger(#[from] LedgerError),
}

impl ExternalError {
    /// Shorthand for a [`ExternalError::Reverted`].
    pub fn reverted(collaborator: Address, reason: impl Into<String>) -> Self {
        Self::Reverted {
            collaborator,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller lacks the capability for this call.
    PermissionDenied,
    /// The vault or a strategy is in the wrong state for this call.
    InvalidState,
    /// Not enough assets, shares or allowance to complete the call.
    InsufficientLiquidity,
    /// The call would realize more loss than the caller tolerates.
    ExcessiveLoss,
    /// A parameter is outside its permitted range.
    ParameterOutOfRange,
    /// The call would not change anything.
    NoOp,
    /// Fixed-point arithmetic overflowed or divided by zero.
    Arithmetic,
    /// A collaborator failed.
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::InsufficientLiquidity => "insufficient liquidity",
            ErrorKind::ExcessiveLoss => "excessive loss",
            ErrorKind::ParameterOutOfRange => "parameter out of range",
            ErrorKind::NoOp => "no-op",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::External => "external",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Vault Errors
// ---------------------------------------------------------------------------

/// Errors returned by vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    // -- permission ---------------------------------------------------------
    /// The caller is missing the capability the call requires.
    #[error("not allowed")]
    NotAllowed,

    /// Only the role manager may do this.
    #[error("not role manager")]
    NotRoleManager,

    /// Only the nominated role manager may accept.
    #[error("not future role manager")]
    NotFutureRoleManager,

    /// The sitting role manager tried to accept its own role.
    #[error("role manager cannot accept itself")]
    CannotSelfAccept,

    // -- state --------------------------------------------------------------
    /// A required address was zero.
    #[error("{what} cannot be zero address")]
    ZeroAddress {
        /// What the address was for.
        what: &'static str,
    },

    /// The strategy is already registered.
    #[error("strategy already active")]
    StrategyAlreadyActive,

    /// The strategy manages a different asset than the vault.
    #[error("invalid asset")]
    InvalidAsset,

    /// Revocation requires the strategy to be debt free.
    #[error("strategy has debt")]
    StrategyHasDebt,

    /// Revocation target is not registered.
    #[error("strategy not active")]
    StrategyNotActive,

    /// The call names a strategy that is not registered.
    #[error("inactive strategy")]
    InactiveStrategy,

    /// A proposed default queue contains an unregistered strategy.
    #[error("!inactive")]
    QueueMemberInactive,

    /// A proposed default queue lists the same strategy twice.
    #[error("duplicate strategy in queue")]
    DuplicateQueueEntry,

    /// A proposed default queue is longer than the maximum.
    #[error("queue length {len} exceeds maximum of {max}")]
    QueueTooLong {
        /// Proposed length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// The vault has been shut down.
    #[error("vault is shutdown")]
    Shutdown,

    /// Shutdown is one-way and has already happened.
    #[error("already shutdown")]
    AlreadyShutdown,

    /// A deposit limit module is in charge of deposit limits.
    #[error("using module")]
    UsingModule,

    /// A fixed deposit limit is in charge of deposit limits.
    #[error("using deposit limit")]
    UsingDepositLimit,

    /// Shares cannot be sent to this receiver.
    #[error("invalid receiver")]
    InvalidReceiver,

    /// Initialization parameters failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // -- liquidity ----------------------------------------------------------
    /// Idle plus withdrawable strategy funds cannot cover the request.
    #[error("insufficient assets in vault")]
    InsufficientAssets,

    /// The owner holds fewer shares than the exit requires.
    #[error("insufficient shares to redeem")]
    InsufficientShares,

    /// The exit would pay out zero assets.
    #[error("no assets to withdraw")]
    NoAssetsToWithdraw,

    /// The exit would burn zero shares.
    #[error("no shares to redeem")]
    NoSharesToRedeem,

    /// The strategy has nothing it can return right now.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Idle funds are all reserved by the minimum idle floor.
    #[error("no funds to deposit")]
    NoFundsToDeposit,

    /// The deposit exceeds what the vault currently accepts.
    #[error("exceed deposit limit")]
    ExceedDepositLimit,

    /// The exit exceeds what the withdraw limit module allows.
    #[error("exceed withdraw limit")]
    ExceedWithdrawLimit,

    /// The deposit is too small to mint a single share.
    #[error("cannot mint zero")]
    CannotMintZero,

    /// Share issuance at a zero price per share.
    #[error("amount too high")]
    AmountTooHigh,

    /// A share transfer exceeds the sender's balance.
    #[error("insufficient share balance")]
    InsufficientShareBalance,

    /// A delegated share movement exceeds the allowance.
    #[error("insufficient allowance")]
    InsufficientAllowance,

    /// The strategy has no debt to sell.
    #[error("nothing to buy")]
    NothingToBuy,

    /// The purchase amount maps to no part of the vault's position.
    #[error("cannot buy zero")]
    CannotBuyZero,

    /// A debt purchase for zero assets.
    #[error("nothing to buy with")]
    NothingToBuyWith,

    /// Moving the asset failed on the ledger.
    #[error("asset transfer failed: {0}")]
    Ledger(#[from] LedgerError),

    // -- loss ---------------------------------------------------------------
    /// Realized loss exceeds the caller's tolerance.
    #[error("too much loss")]
    TooMuchLoss,

    /// The strategy is carrying losses that a report must realize first.
    #[error("strategy has unrealised losses")]
    UnrealisedLosses,

    // -- parameters ---------------------------------------------------------
    /// Unlock window above one year.
    #[error("profit unlock time too long")]
    ProfitUnlockTimeTooLong,

    /// Debt increase beyond the strategy's cap.
    #[error("target debt higher than max debt")]
    TargetDebtAboveMax,

    /// Loss tolerance above 100%.
    #[error("max loss")]
    MaxLossOutOfRange,

    // -- no-op --------------------------------------------------------------
    /// The requested debt is already the current debt.
    #[error("new debt equals current debt")]
    NewDebtEqualsCurrentDebt,

    // -- arithmetic ---------------------------------------------------------
    /// A checked operation overflowed.
    #[error("arithmetic overflow in {context}")]
    Overflow {
        /// Quantity being computed.
        context: &'static str,
    },

    /// Division by zero in fixed-point math.
    #[error("division by zero")]
    DivisionByZero,

    // -- collaborators ------------------------------------------------------
    /// A strategy, accountant or module failed.
    #[error(transparent)]
    External(#[from] ExternalError),
}

impl VaultError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        use VaultError::*;
        match self {
            NotAllowed | NotRoleManager | NotFutureRoleManager | CannotSelfAccept => {
                ErrorKind::PermissionDenied
            }
            ZeroAddress { .. }
            | StrategyAlreadyActive
            | InvalidAsset
            | StrategyHasDebt
            | StrategyNotActive
            | InactiveStrategy
            | QueueMemberInactive
            | DuplicateQueueEntry
            | Shutdown
            | AlreadyShutdown
            | UsingModule
            | UsingDepositLimit
            | InvalidReceiver
            | InvalidConfig(_) => ErrorKind::InvalidState,
            InsufficientAssets
            | InsufficientShares
            | NoSharesToRedeem
            | NoAssetsToWithdraw
            | NothingToWithdraw
            | NoFundsToDeposit
            | ExceedDepositLimit
            | ExceedWithdrawLimit
            | CannotMintZero
            | AmountTooHigh
            | InsufficientShareBalance
            | InsufficientAllowance
            | NothingToBuy
            | CannotBuyZero
            | NothingToBuyWith
            | Ledger(_) => ErrorKind::InsufficientLiquidity,
            TooMuchLoss | UnrealisedLosses => ErrorKind::ExcessiveLoss,
            ProfitUnlockTimeTooLong | TargetDebtAboveMax | MaxLossOutOfRange | QueueTooLong { .. } => {
                ErrorKind::ParameterOutOfRange
            }
            NewDebtEqualsCurrentDebt => ErrorKind::NoOp,
            Overflow { .. } | DivisionByZero => ErrorKind::Arithmetic,
            External(_) => ErrorKind::External,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reasons_are_stable() {
        assert_eq!(VaultError::NotAllowed.to_string(), "not allowed");
        assert_eq!(
            VaultError::ZeroAddress { what: "strategy" }.to_string(),
            "strategy cannot be zero address"
        );
        assert_eq!(VaultError::QueueMemberInactive.to_string(), "!inactive");
        assert_eq!(
            VaultError::NewDebtEqualsCurrentDebt.to_string(),
            "new debt equals current debt"
        );
        assert_eq!(
            VaultError::UnrealisedLosses.to_string(),
            "strategy has unrealised losses"
        );
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(VaultError::NotAllowed.kind(), ErrorKind::PermissionDenied);
        assert_eq!(VaultError::InvalidAsset.kind(), ErrorKind::InvalidState);
        assert_eq!(
            VaultError::NoFundsToDeposit.kind(),
            ErrorKind::InsufficientLiquidity
        );
        assert_eq!(VaultError::TooMuchLoss.kind(), ErrorKind::ExcessiveLoss);
        assert_eq!(
            VaultError::TargetDebtAboveMax.kind(),
            ErrorKind::ParameterOutOfRange
        );
        assert_eq!(VaultError::NewDebtEqualsCurrentDebt.kind(), ErrorKind::NoOp);
    }

    #[test]
    fn external_errors_pass_through_their_message() {
        let strategy = Address::from_label("strategy");
        let err: VaultError = ExternalError::reverted(strategy, "paused").into();
        assert_eq!(err.kind(), ErrorKind::External);
        assert_eq!(err.to_string(), format!("{} reverted: paused", strategy));
    }
}
