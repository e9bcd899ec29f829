//! Waiter registry and rendezvous protocol.
//!
//! A caller registers an identifier and suspends until a visit for that
//! identifier arrives. The visit decides the [`Outcome`](clickgate_types::Outcome)
//! (fulfilled, timed out, or blocked), hands it to the waiter through a
//! single-slot channel, and removes the record:
//!
//! ```text
//! Unregistered --await--> Pending --visit--> Resolved(outcome) --> Unregistered
//! ```
//!
//! Records are only ever resolved once. A second visit for the same
//! identifier finds nothing pending.

pub mod error;
pub mod registry;
pub mod rendezvous;

pub use clickgate_types::{Clock, SystemClock};
pub use error::RegistryError;
pub use registry::{PendingVisit, Resolution, SweepReport, WaiterRegistry};
pub use rendezvous::{decide, Decision};
