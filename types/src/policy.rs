//! Read-only resolution policy shared by every visit.

use std::time::Duration;

use crate::BlockList;

/// The settings a visit is judged against: how long a verification stays
/// open and which client addresses are refused.
///
/// Built once from configuration and never mutated while serving.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyPolicy {
    pub timeout: Duration,
    pub blocklist: BlockList,
}

impl VerifyPolicy {
    pub fn new(timeout: Duration, blocklist: BlockList) -> Self {
        Self { timeout, blocklist }
    }

    /// A policy with no blocked addresses.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, BlockList::new())
    }
}
