//! Shared types for clickgate.
//!
//! This crate defines the vocabulary used by every other crate in the workspace:
//! the terminal [`Outcome`] of a verification, the [`BlockList`] of disallowed
//! client addresses, the read-only [`VerifyPolicy`] consulted at resolution time,
//! and the [`Clock`] that timestamps registrations.

pub mod blocklist;
pub mod clock;
pub mod error;
pub mod outcome;
pub mod policy;

pub use blocklist::BlockList;
pub use clock::{Clock, SystemClock};
pub use error::TypeError;
pub use outcome::Outcome;
pub use policy::VerifyPolicy;
