//! Deterministic [`tk_core::Clock`] test doubles.

use std::sync::atomic::{AtomicI64, Ordering};
use tk_core::identity::Timestamp;
use tk_core::Clock;

/// A clock pinned to a single instant, for tests that don't care about time
/// advancing.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl FixedClock {
    pub fn at(timestamp: Timestamp) -> Self {
        Self(timestamp)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// A clock that advances by a fixed step on every call, for tests asserting
/// on ordering or staleness without depending on wall-clock time.
pub struct SteppingClock {
    origin: Timestamp,
    step_millis: i64,
    calls: AtomicI64,
}

impl SteppingClock {
    pub fn new(origin: Timestamp, step_millis: i64) -> Self {
        Self {
            origin,
            step_millis,
            calls: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.origin + chrono::Duration::milliseconds(self.step_millis * n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_never_advances() {
        let now = chrono::Utc::now();
        let clock = FixedClock::at(now);
        assert_eq!(clock.now(), now);
        assert_eq!(clock.now(), now);
    }

    #[test]
    fn stepping_clock_advances_each_call() {
        let origin = chrono::Utc::now();
        let clock = SteppingClock::new(origin, 100);
        let first = clock.now();
        let second = clock.now();
        assert!(second > first);
    }
}
