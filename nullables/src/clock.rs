//! Nullable clock — deterministic time for testing.

use clickgate_types::Clock;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Shared across tasks, so the
/// current instant sits behind a mutex rather than a `Cell`.
pub struct NullClock {
    origin: Instant,
    current: Mutex<Instant>,
}

impl NullClock {
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            current: Mutex::new(origin),
        }
    }

    /// Advance time by `by`.
    pub fn advance(&self, by: Duration) {
        *self.current.lock().unwrap() += by;
    }

    /// Advance time by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the time to `offset` after the clock's origin.
    pub fn set(&self, offset: Duration) {
        *self.current.lock().unwrap() = self.origin + offset;
    }

    /// How far the clock has moved since it was created.
    pub fn elapsed(&self) -> Duration {
        *self.current.lock().unwrap() - self.origin
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for NullClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_stands_still_until_advanced() {
        let clock = NullClock::new();
        let before = clock.now();
        assert_eq!(clock.now(), before);

        clock.advance_millis(1500);
        assert_eq!(clock.now() - before, Duration::from_millis(1500));
    }

    #[test]
    fn set_is_relative_to_origin() {
        let clock = NullClock::new();
        clock.advance(Duration::from_secs(10));
        clock.set(Duration::from_secs(2));
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }
}
