//! Outcome decision for a visit that found a pending record.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. the verification window has elapsed: [`Outcome::TimedOut`]
//! 2. the client address is blocklisted: [`Outcome::Blocked`]
//! 3. otherwise: [`Outcome::Fulfilled`]
//!
//! A late visit from a blocked address is therefore reported as timed out.

use std::net::IpAddr;
use std::time::Duration;

use clickgate_types::{Outcome, VerifyPolicy};

/// The decided outcome plus the blocklist reason, if any.
///
/// The reason is presentation data for the response body and is never
/// delivered to the waiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision<'a> {
    pub outcome: Outcome,
    pub block_reason: Option<&'a str>,
}

/// Decide the outcome of a visit that arrived `elapsed` after registration.
///
/// `client` is `None` when the HTTP layer could not determine the peer
/// address; the blocklist is not consulted in that case.
pub fn decide<'a>(
    elapsed: Duration,
    client: Option<&IpAddr>,
    policy: &'a VerifyPolicy,
) -> Decision<'a> {
    if elapsed >= policy.timeout {
        return Decision {
            outcome: Outcome::TimedOut,
            block_reason: None,
        };
    }

    if let Some(reason) = client.and_then(|addr| policy.blocklist.reason_for(addr)) {
        return Decision {
            outcome: Outcome::Blocked,
            block_reason: Some(reason),
        };
    }

    Decision {
        outcome: Outcome::Fulfilled,
        block_reason: None,
    }
}
