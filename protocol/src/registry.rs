//! # Strategy Registry
//!
//! Per-strategy bookkeeping plus the default withdrawal queue.
//!
//! A strategy is active exactly when it has a [`StrategyParams`] entry with
//! a non-zero activation time. Revocation removes the entry, so looking up a
//! revoked strategy yields all-zero parameters. The queue never holds an
//! inactive strategy: revocation removes it and [`DefaultQueue::replace`]
//! validates every member.

use std::collections::HashMap;
use std::sync::Arc;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::clock::Timestamp;
use crate::collaborators::Strategy;
use crate::config::MAX_QUEUE;
use crate::error::VaultError;

/// Vault-side record of a strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyParams {
    /// When the strategy was added. Zero means inactive.
    pub activation: Timestamp,
    /// When the strategy last reported.
    pub last_report: Timestamp,
    /// Assets the vault has lent it.
    pub current_debt: u128,
    /// Cap on `current_debt` for debt increases.
    pub max_debt: u128,
}

impl StrategyParams {
    /// Whether the strategy is registered.
    pub fn is_active(&self) -> bool {
        self.activation != 0
    }
}

// ---------------------------------------------------------------------------
// Default Queue
// ---------------------------------------------------------------------------

/// Ordered, bounded list of strategies to pull liquidity from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultQueue(ArrayVec<Address, MAX_QUEUE>);

impl DefaultQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `strategy`. Returns `false` without changing anything when
    /// the queue is full.
    pub fn push(&mut self, strategy: Address) -> bool {
        self.0.try_push(strategy).is_ok()
    }

    /// Removes `strategy` if present.
    pub fn remove(&mut self, strategy: &Address) -> bool {
        match self.0.iter().position(|s| s == strategy) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether `strategy` is queued.
    pub fn contains(&self, strategy: &Address) -> bool {
        self.0.contains(strategy)
    }

    /// Number of queued strategies.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether another strategy would fit.
    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }

    /// The queued strategies in withdrawal order.
    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    /// Replaces the whole queue. All-or-nothing: on error the queue is
    /// untouched.
    pub fn replace(
        &mut self,
        next: &[Address],
        is_active: impl Fn(&Address) -> bool,
    ) -> Result<(), VaultError> {
        if next.len() > MAX_QUEUE {
            return Err(VaultError::QueueTooLong {
                len: next.len(),
                max: MAX_QUEUE,
            });
        }
        let mut queue = ArrayVec::new();
        for strategy in next {
            if !is_active(strategy) {
                return Err(VaultError::QueueMemberInactive);
            }
            if queue.contains(strategy) {
                return Err(VaultError::DuplicateQueueEntry);
            }
            queue.push(*strategy);
        }
        self.0 = queue;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registered strategies, their parameters and the default queue.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    params: HashMap<Address, StrategyParams>,
    handles: HashMap<Address, Arc<dyn Strategy>>,
    queue: DefaultQueue,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of `strategy`; all zero when it is not registered.
    pub fn params(&self, strategy: &Address) -> StrategyParams {
        self.params.get(strategy).copied().unwrap_or_default()
    }

    /// Whether `strategy` is registered.
    pub fn is_active(&self, strategy: &Address) -> bool {
        self.params(strategy).is_active()
    }

    /// Handle of an active strategy.
    pub fn handle(&self, strategy: &Address) -> Result<Arc<dyn Strategy>, VaultError> {
        self.handles
            .get(strategy)
            .cloned()
            .ok_or(VaultError::InactiveStrategy)
    }

    /// Registers a strategy. Returns whether it made it into the queue.
    pub fn activate(
        &mut self,
        strategy: Arc<dyn Strategy>,
        now: Timestamp,
        add_to_queue: bool,
    ) -> Result<bool, VaultError> {
        let address = strategy.address();
        if self.is_active(&address) {
            return Err(VaultError::StrategyAlreadyActive);
        }
        self.params.insert(
            address,
            StrategyParams {
                activation: now,
                last_report: now,
                current_debt: 0,
                max_debt: 0,
            },
        );
        self.handles.insert(address, strategy);
        Ok(add_to_queue && self.queue.push(address))
    }

    /// Forgets a strategy and drops it from the queue.
    pub fn deactivate(&mut self, strategy: &Address) {
        self.params.remove(strategy);
        self.handles.remove(strategy);
        self.queue.remove(strategy);
    }

    /// Mutable parameters of an active strategy.
    pub fn params_mut(&mut self, strategy: &Address) -> Result<&mut StrategyParams, VaultError> {
        self.params
            .get_mut(strategy)
            .ok_or(VaultError::InactiveStrategy)
    }

    /// The default queue.
    pub fn queue(&self) -> &DefaultQueue {
        &self.queue
    }

    /// Replaces the default queue after validating every member.
    pub fn set_queue(&mut self, next: &[Address]) -> Result<(), VaultError> {
        let params = &self.params;
        self.queue
            .replace(next, |s| params.get(s).map(|p| p.is_active()).unwrap_or(false))
    }
}
