// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.
//!
//! Event timestamps (UTC nanoseconds) and supervisor timers both need a
//! source of time that can be frozen and advanced in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Current wall-clock time, nanoseconds since the Unix epoch.
    fn epoch_ns(&self) -> u64;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ns(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ns: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            epoch_ns: Arc::new(Mutex::new(1_000_000_000)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.epoch_ns.lock() += duration.as_nanos() as u64;
    }

    pub fn set_epoch_ns(&self, ns: u64) {
        *self.epoch_ns.lock() = ns;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ns(&self) -> u64 {
        *self.epoch_ns.lock()
    }
}

/// Object-safe erasure of [`Clock`], so components that are themselves
/// shared behind an `Arc` (router, bus, supervisor) can hold one clock
/// implementation chosen at startup without becoming generic over it.
trait ErasedClock: Send + Sync {
    fn now(&self) -> Instant;
    fn epoch_ns(&self) -> u64;
}

impl<C: Clock> ErasedClock for C {
    fn now(&self) -> Instant {
        Clock::now(self)
    }

    fn epoch_ns(&self) -> u64 {
        Clock::epoch_ns(self)
    }
}

/// A [`Clock`] behind a type-erased `Arc`, cheaply `Clone`.
#[derive(Clone)]
pub struct SharedClock(Arc<dyn ErasedClock>);

impl SharedClock {
    pub fn new(clock: impl Clock) -> Self {
        Self(Arc::new(clock))
    }
}

impl Clock for SharedClock {
    fn now(&self) -> Instant {
        self.0.now()
    }

    fn epoch_ns(&self) -> u64 {
        self.0.epoch_ns()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
