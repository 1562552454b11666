//! # Roles & Governance Handoff
//!
//! Each account carries a [`Roles`] flag set. Every privileged vault entry
//! point demands one specific capability; holding it is both necessary and
//! sufficient. Capabilities are only ever changed by an explicit set, add or
//! remove issued by the role manager.
//!
//! The role manager itself changes hands through [`RoleManagerHandoff`], a
//! two-step state machine: the current manager nominates, the nominee
//! accepts.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A set of vault capabilities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(u16);

impl Roles {
    /// Can add strategies.
    pub const ADD_STRATEGY_MANAGER: Roles = Roles(1);
    /// Can revoke debt-free strategies.
    pub const REVOKE_STRATEGY_MANAGER: Roles = Roles(1 << 1);
    /// Can revoke strategies that still hold debt, realizing it as loss.
    pub const FORCE_REVOKE_MANAGER: Roles = Roles(1 << 2);
    /// Can replace the accountant.
    pub const ACCOUNTANT_MANAGER: Roles = Roles(1 << 3);
    /// Can change the default queue and whether it is enforced.
    pub const QUEUE_MANAGER: Roles = Roles(1 << 4);
    /// Can process strategy reports.
    pub const REPORTING_MANAGER: Roles = Roles(1 << 5);
    /// Can move funds between idle and strategies.
    pub const DEBT_MANAGER: Roles = Roles(1 << 6);
    /// Can set per-strategy debt caps.
    pub const MAX_DEBT_MANAGER: Roles = Roles(1 << 7);
    /// Can set the deposit limit or deposit limit module.
    pub const DEPOSIT_LIMIT_MANAGER: Roles = Roles(1 << 8);
    /// Can set the withdraw limit module.
    pub const WITHDRAW_LIMIT_MANAGER: Roles = Roles(1 << 9);
    /// Can set the minimum idle floor.
    pub const MINIMUM_IDLE_MANAGER: Roles = Roles(1 << 10);
    /// Can change the profit unlock window.
    pub const PROFIT_UNLOCK_MANAGER: Roles = Roles(1 << 11);
    /// Can buy strategy debt out of the vault.
    pub const DEBT_PURCHASER: Roles = Roles(1 << 12);
    /// Can shut the vault down.
    pub const EMERGENCY_MANAGER: Roles = Roles(1 << 13);

    const NAMED: [(Roles, &'static str); 14] = [
        (Self::ADD_STRATEGY_MANAGER, "ADD_STRATEGY_MANAGER"),
        (Self::REVOKE_STRATEGY_MANAGER, "REVOKE_STRATEGY_MANAGER"),
        (Self::FORCE_REVOKE_MANAGER, "FORCE_REVOKE_MANAGER"),
        (Self::ACCOUNTANT_MANAGER, "ACCOUNTANT_MANAGER"),
        (Self::QUEUE_MANAGER, "QUEUE_MANAGER"),
        (Self::REPORTING_MANAGER, "REPORTING_MANAGER"),
        (Self::DEBT_MANAGER, "DEBT_MANAGER"),
        (Self::MAX_DEBT_MANAGER, "MAX_DEBT_MANAGER"),
        (Self::DEPOSIT_LIMIT_MANAGER, "DEPOSIT_LIMIT_MANAGER"),
        (Self::WITHDRAW_LIMIT_MANAGER, "WITHDRAW_LIMIT_MANAGER"),
        (Self::MINIMUM_IDLE_MANAGER, "MINIMUM_IDLE_MANAGER"),
        (Self::PROFIT_UNLOCK_MANAGER, "PROFIT_UNLOCK_MANAGER"),
        (Self::DEBT_PURCHASER, "DEBT_PURCHASER"),
        (Self::EMERGENCY_MANAGER, "EMERGENCY_MANAGER"),
    ];

    /// No capabilities.
    pub const fn empty() -> Self {
        Roles(0)
    }

    /// Every capability.
    pub const fn all() -> Self {
        Roles((1 << 14) - 1)
    }

    /// Rebuilds a set from its raw mask, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Roles(bits & Self::all().0)
    }

    /// The raw mask.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every capability in `other` is present.
    pub const fn contains(self, other: Roles) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Capabilities in either set.
    pub const fn union(self, other: Roles) -> Self {
        Roles(self.0 | other.0)
    }

    /// Capabilities in `self` but not in `other`.
    pub const fn difference(self, other: Roles) -> Self {
        Roles(self.0 & !other.0)
    }

    /// Iterates over the names of the capabilities present.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(role, _)| self.contains(*role))
            .map(|(_, name)| name)
    }
}

impl BitOr for Roles {
    type Output = Roles;

    fn bitor(self, rhs: Roles) -> Roles {
        self.union(rhs)
    }
}

impl BitAnd for Roles {
    type Output = Roles;

    fn bitand(self, rhs: Roles) -> Roles {
        Roles(self.0 & rhs.0)
    }
}

impl Not for Roles {
    type Output = Roles;

    fn not(self) -> Roles {
        Roles::all().difference(self)
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let names: Vec<&str> = self.names().collect();
        write!(f, "{}", names.join("|"))
    }
}

impl fmt::Debug for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Roles({:#06x}: {})", self.0, self)
    }
}

// ---------------------------------------------------------------------------
// Role Manager Handoff
// ---------------------------------------------------------------------------

/// Current role manager plus an optional nominee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleManagerHandoff {
    current: Address,
    pending: Option<Address>,
}

impl RoleManagerHandoff {
    /// Starts with `current` in charge and nobody nominated.
    pub fn new(current: Address) -> Self {
        Self {
            current,
            pending: None,
        }
    }

    /// The account in charge.
    pub fn current(&self) -> Address {
        self.current
    }

    /// The nominee, or `Address::ZERO` when nobody is nominated.
    pub fn pending(&self) -> Address {
        self.pending.unwrap_or(Address::ZERO)
    }

    /// Nominates `next`. A later nomination overwrites an earlier one, and
    /// nominating the zero address cancels.
    pub fn nominate(&mut self, caller: &Address, next: Address) -> Result<(), VaultError> {
        if *caller != self.current {
            return Err(VaultError::NotRoleManager);
        }
        self.pending = if next.is_zero() { None } else { Some(next) };
        Ok(())
    }

    /// Completes the handoff. Only the nominee may accept, and the sitting
    /// manager can never accept on its own behalf.
    pub fn accept(&mut self, caller: &Address) -> Result<Address, VaultError> {
        if *caller == self.current {
            return Err(VaultError::CannotSelfAccept);
        }
        match self.pending {
            Some(pending) if pending == *caller => {
                self.current = pending;
                self.pending = None;
                Ok(pending)
            }
            _ => Err(VaultError::NotFutureRoleManager),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_match_the_published_layout() {
        assert_eq!(Roles::ADD_STRATEGY_MANAGER.bits(), 1);
        assert_eq!(Roles::MINIMUM_IDLE_MANAGER.bits(), 1024);
        assert_eq!(Roles::EMERGENCY_MANAGER.bits(), 8192);
        assert_eq!(
            (Roles::EMERGENCY_MANAGER | Roles::DEBT_MANAGER).bits(),
            8256
        );
        assert_eq!(Roles::all().bits(), 16_383);
    }

    #[test]
    fn union_and_difference_leave_other_bits_alone() {
        let roles = Roles::DEBT_MANAGER | Roles::QUEUE_MANAGER;
        let added = roles.union(Roles::REPORTING_MANAGER);
        assert!(added.contains(Roles::DEBT_MANAGER | Roles::REPORTING_MANAGER));

        let removed = added.difference(Roles::QUEUE_MANAGER);
        assert!(!removed.contains(Roles::QUEUE_MANAGER));
        assert!(removed.contains(Roles::DEBT_MANAGER));

        assert_eq!(Roles::empty().difference(Roles::all()), Roles::empty());
    }

    #[test]
    fn not_stays_within_known_bits() {
        assert_eq!(!Roles::empty(), Roles::all());
        assert_eq!(Roles::from_bits_truncate(u16::MAX), Roles::all());
    }

    #[test]
    fn display_lists_names() {
        let roles = Roles::DEBT_MANAGER | Roles::EMERGENCY_MANAGER;
        assert_eq!(roles.to_string(), "DEBT_MANAGER|EMERGENCY_MANAGER");
        assert_eq!(Roles::empty().to_string(), "NONE");
    }

    #[test]
    fn handoff_requires_nominee() {
        let gov = Address::from_label("gov");
        let next = Address::from_label("next");
        let mut handoff = RoleManagerHandoff::new(gov);

        assert!(matches!(
            handoff.nominate(&next, next),
            Err(VaultError::NotRoleManager)
        ));
        handoff.nominate(&gov, next).unwrap();
        assert_eq!(handoff.current(), gov);
        assert_eq!(handoff.pending(), next);

        assert!(matches!(
            handoff.accept(&gov),
            Err(VaultError::CannotSelfAccept)
        ));
        assert_eq!(handoff.accept(&next).unwrap(), next);
        assert_eq!(handoff.current(), next);
        assert_eq!(handoff.pending(), Address::ZERO);
    }

    #[test]
    fn later_nomination_wins() {
        let gov = Address::from_label("gov");
        let first = Address::from_label("first");
        let second = Address::from_label("second");
        let mut handoff = RoleManagerHandoff::new(gov);

        handoff.nominate(&gov, first).unwrap();
        handoff.nominate(&gov, second).unwrap();
        assert!(matches!(
            handoff.accept(&first),
            Err(VaultError::NotFutureRoleManager)
        ));
        assert_eq!(handoff.accept(&second).unwrap(), second);
    }
}
