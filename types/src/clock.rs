//! Time source for wait records.
//!
//! Production code uses [`SystemClock`]; tests swap in the deterministic
//! clock from `clickgate-nullables` so that elapsed time is controlled
//! exactly.

use std::time::Instant;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
