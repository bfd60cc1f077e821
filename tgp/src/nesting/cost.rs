//! Cost sources sampled on execution entry and exit
//!
//! A [`CostSource`] is shared configuration; each thread opens its own
//! [`CostCounter`] from it the first time it needs one (hardware counter
//! contexts are per thread). The built-in [`WallClock`] counts nanoseconds
//! since the process epoch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Monotonic per-thread cost reading
pub trait CostCounter {
    fn read(&mut self) -> u64;
}

/// Factory for per-thread counters
pub trait CostSource {
    type Counter: CostCounter;

    /// Open a counter for the calling thread
    fn open(&self) -> Self::Counter;

    /// Name of the measured event, for logs
    fn event_name(&self) -> &str;
}

/// Process-start epoch for timestamps and wall-clock cost.
static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Nanoseconds since the process epoch
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_ns() -> u64 {
    // u64 nanoseconds cover ~584 years of uptime
    epoch().elapsed().as_nanos() as u64
}

/// Wall-clock cost: elapsed nanoseconds
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

#[derive(Debug)]
pub struct WallClockCounter(());

impl CostCounter for WallClockCounter {
    fn read(&mut self) -> u64 {
        now_ns()
    }
}

impl CostSource for WallClock {
    type Counter = WallClockCounter;

    fn open(&self) -> WallClockCounter {
        // Pin the epoch before the first reading
        let _ = epoch();
        WallClockCounter(())
    }

    fn event_name(&self) -> &str {
        "wall-clock-ns"
    }
}

/// Externally driven cost value
///
/// Every counter opened from the same `ManualCost` reads the same shared
/// value. Used by event log replay and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualCost(Arc<AtomicU64>);

impl ManualCost {
    #[must_use]
    pub fn new(initial: u64) -> Self {
        Self(Arc::new(AtomicU64::new(initial)))
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn advance(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl CostCounter for ManualCost {
    fn read(&mut self) -> u64 {
        self.value()
    }
}

impl CostSource for ManualCost {
    type Counter = ManualCost;

    fn open(&self) -> ManualCost {
        self.clone()
    }

    fn event_name(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_is_monotonic() {
        let mut counter = WallClock.open();
        let a = counter.read();
        let b = counter.read();
        assert!(b >= a, "wall clock went backwards: {a} -> {b}");
    }

    #[test]
    fn test_manual_cost_is_shared_between_counters() {
        let cost = ManualCost::new(5);
        let mut counter = cost.open();
        cost.advance(10);
        assert_eq!(counter.read(), 15);
        cost.set(2);
        assert_eq!(counter.read(), 2);
    }
}
