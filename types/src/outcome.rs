//! Terminal outcome of a single verification attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result delivered to a waiter once its identifier is resolved.
///
/// Exactly one outcome is produced per pending record. A visit for an
/// identifier with nothing pending has no outcome at all; the HTTP layer
/// reports that case separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The identifier was visited in time from an allowed address.
    Fulfilled,
    /// The visit arrived after the verification window closed.
    TimedOut,
    /// The visit came from a blocklisted address.
    Blocked,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::TimedOut => "timed_out",
            Self::Blocked => "blocked",
        }
    }

    /// Whether the human on the other end actually verified.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
