//! Time source for the accounting engine.
//!
//! Profit unlocking and management fees are functions of elapsed seconds,
//! so the vault never reads the wall clock directly. Production code uses
//! [`SystemClock`]; tests and simulations drive a [`ManualClock`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Unix seconds.
pub type Timestamp = u64;

/// A source of the current block time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in unix seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-epoch clocks are clamped to zero.
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Starts the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.now.store(to, Ordering::SeqCst);
    }

    /// Moves forward by `seconds` and returns the new time.
    pub fn advance(&self, seconds: u64) -> Timestamp {
        self.now.fetch_add(seconds, Ordering::SeqCst) + seconds
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
