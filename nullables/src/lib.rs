//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the registry (currently just time) are
//! abstracted behind traits. The implementations here never read the real
//! clock and only change when a test tells them to.
//!
//! Usage: build the registry with `WaiterRegistry::with_clock(Arc::new(NullClock::new()))`
//! and advance time explicitly between registration and visit.

pub mod clock;

pub use clock::NullClock;
