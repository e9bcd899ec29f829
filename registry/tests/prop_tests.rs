use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use clickgate_nullables::NullClock;
use clickgate_registry::{decide, WaiterRegistry};
use clickgate_types::{BlockList, Outcome, VerifyPolicy};

fn policy_blocking(addr: IpAddr, timeout_ms: u64) -> VerifyPolicy {
    let blocklist: BlockList = [(addr, "abuse")].into_iter().collect();
    VerifyPolicy::new(Duration::from_millis(timeout_ms), blocklist)
}

proptest! {
    /// Any visit at or past the deadline times out, blocked or not.
    #[test]
    fn late_visits_always_time_out(
        timeout_ms in 0u64..10_000,
        extra_ms in 0u64..10_000,
        octets in prop::array::uniform4(0u8..),
        blocked in any::<bool>(),
    ) {
        let client = IpAddr::V4(Ipv4Addr::from(octets));
        let policy = if blocked {
            policy_blocking(client, timeout_ms)
        } else {
            VerifyPolicy::with_timeout(Duration::from_millis(timeout_ms))
        };
        let d = decide(Duration::from_millis(timeout_ms + extra_ms), Some(&client), &policy);
        prop_assert_eq!(d.outcome, Outcome::TimedOut);
        prop_assert!(d.block_reason.is_none());
    }

    /// Before the deadline, the blocklist alone separates Blocked from Fulfilled.
    #[test]
    fn early_visits_follow_blocklist(
        timeout_ms in 1u64..10_000,
        frac in 0.0f64..1.0,
        octets in prop::array::uniform4(0u8..),
        blocked in any::<bool>(),
    ) {
        let client = IpAddr::V4(Ipv4Addr::from(octets));
        let policy = if blocked {
            policy_blocking(client, timeout_ms)
        } else {
            VerifyPolicy::with_timeout(Duration::from_millis(timeout_ms))
        };
        let elapsed_ms = ((timeout_ms as f64) * frac) as u64;
        prop_assume!(elapsed_ms < timeout_ms);

        let d = decide(Duration::from_millis(elapsed_ms), Some(&client), &policy);
        let expected = if blocked { Outcome::Blocked } else { Outcome::Fulfilled };
        prop_assert_eq!(d.outcome, expected);
    }

    /// Whatever the timing, the waiter receives exactly the outcome the visit reported.
    #[test]
    fn waiter_sees_the_visit_outcome(elapsed_ms in 0u64..4_000, timeout_ms in 1u64..4_000) {
        let clock = Arc::new(NullClock::new());
        let registry = WaiterRegistry::with_clock(clock.clone());
        let policy = VerifyPolicy::with_timeout(Duration::from_millis(timeout_ms));

        let visit = registry.register("prop").unwrap();
        clock.advance_millis(elapsed_ms);
        let res = registry.try_resolve("prop", None, &policy).unwrap();

        prop_assert_eq!(visit.wait_blocking().unwrap(), res.outcome);
        prop_assert!(registry.try_resolve("prop", None, &policy).is_none());
    }
}
