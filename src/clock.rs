//! Time source abstraction for TTL and expiry arithmetic.
//!
//! Components never call `Instant::now()` directly; the clock is passed in
//! as an explicit dependency so tests can drive time by hand.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic instant for TTL arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock unix seconds for token claims.
    fn unix_seconds(&self) -> i64;
}

/// Production clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
            })
    }
}

/// Hand-driven clock for tests. Both the monotonic and wall-clock views
/// advance together.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    epoch: i64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new(epoch: i64) -> Self {
        Self {
            start: Instant::now(),
            epoch,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut offset = self
            .offset
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *offset += delta;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.offset()
    }

    fn unix_seconds(&self) -> i64 {
        let elapsed = i64::try_from(self.offset().as_secs()).unwrap_or(i64::MAX);
        self.epoch.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SystemClock};
    use std::time::Duration;

    #[test]
    fn system_clock_unix_seconds_is_positive() {
        assert!(SystemClock.unix_seconds() > 0);
    }

    #[test]
    fn manual_clock_advances_both_views() {
        let clock = ManualClock::new(1_000);
        let before = clock.now();
        assert_eq!(clock.unix_seconds(), 1_000);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.unix_seconds(), 1_090);
        assert_eq!(clock.now().duration_since(before), Duration::from_secs(90));
    }
}
