//! Process-wide map from identifier to pending wait record.
//!
//! The map is guarded by a synchronous mutex that is only held for short,
//! non-awaiting critical sections. Resolution removes the record under the
//! same lock acquisition that looked it up, so two concurrent visits for
//! one identifier can never both see it.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use clickgate_types::{Clock, Outcome, SystemClock, VerifyPolicy};

use crate::rendezvous::decide;
use crate::RegistryError;

/// One outstanding verification request.
struct WaitRecord {
    started_at: Instant,
    signal: oneshot::Sender<Outcome>,
}

impl WaitRecord {
    /// The caller that registered this record has stopped listening.
    fn is_abandoned(&self) -> bool {
        self.signal.is_closed()
    }
}

/// Handle returned by [`WaiterRegistry::register`].
///
/// Owns the read side of the record's signal. Dropping it abandons the
/// wait; the record is then replaced by the next registration for the same
/// identifier or pruned by [`WaiterRegistry::sweep_expired`].
#[derive(Debug)]
pub struct PendingVisit {
    identifier: String,
    started_at: Instant,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingVisit {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Suspend until a visit resolves the identifier.
    ///
    /// There is no timeout here: the window is enforced by whichever visit
    /// (or sweep) resolves the record.
    pub async fn wait(self) -> Result<Outcome, RegistryError> {
        let PendingVisit { identifier, rx, .. } = self;
        rx.await
            .map_err(|_| RegistryError::SignalDropped(identifier))
    }

    /// Block the current thread until a visit resolves the identifier.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    /// Use [`PendingVisit::wait`] there instead.
    pub fn wait_blocking(self) -> Result<Outcome, RegistryError> {
        let PendingVisit { identifier, rx, .. } = self;
        rx.blocking_recv()
            .map_err(|_| RegistryError::SignalDropped(identifier))
    }
}

/// The result of a visit that found a pending record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Time between registration and the visit.
    pub elapsed: Duration,
    /// Blocklist reason when `outcome` is [`Outcome::Blocked`].
    pub block_reason: Option<String>,
    /// Whether the waiter was still listening when the outcome was sent.
    pub delivered: bool,
}

/// Counts from one [`WaiterRegistry::sweep_expired`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records resolved as timed out.
    pub expired: usize,
    /// Records dropped because their waiter had gone away.
    pub abandoned: usize,
}

/// Registry of identifiers with a caller waiting on them.
pub struct WaiterRegistry {
    pending: Mutex<HashMap<String, WaitRecord>>,
    clock: Arc<dyn Clock>,
}

impl WaiterRegistry {
    /// Create an empty registry backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry using `clock` for all timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WaitRecord>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start waiting on `identifier`.
    ///
    /// Fails with [`RegistryError::AlreadyPending`] if another caller is
    /// still waiting on the same identifier. A record whose waiter has been
    /// dropped is silently replaced.
    pub fn register(&self, identifier: impl Into<String>) -> Result<PendingVisit, RegistryError> {
        let identifier = identifier.into();
        let started_at = self.clock.now();
        let (tx, rx) = oneshot::channel();

        let mut pending = self.lock();
        if let Some(existing) = pending.get(&identifier) {
            if !existing.is_abandoned() {
                return Err(RegistryError::AlreadyPending(identifier));
            }
            debug!(identifier = %identifier, "replacing abandoned wait record");
        }
        pending.insert(
            identifier.clone(),
            WaitRecord {
                started_at,
                signal: tx,
            },
        );
        drop(pending);

        debug!(identifier = %identifier, "registered wait record");
        Ok(PendingVisit {
            identifier,
            started_at,
            rx,
        })
    }

    /// Register `identifier` and suspend until it is resolved.
    pub async fn await_visit(&self, identifier: impl Into<String>) -> Result<Outcome, RegistryError> {
        self.register(identifier)?.wait().await
    }

    /// Register `identifier` and block the current thread until it is resolved.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn await_blocking(&self, identifier: impl Into<String>) -> Result<Outcome, RegistryError> {
        self.register(identifier)?.wait_blocking()
    }

    /// Resolve `identifier` for a visit from `client`, timed by the registry clock.
    ///
    /// Returns `None` when nothing is pending for the identifier: it was
    /// never registered or has already been resolved.
    pub fn try_resolve(
        &self,
        identifier: &str,
        client: Option<IpAddr>,
        policy: &VerifyPolicy,
    ) -> Option<Resolution> {
        self.try_resolve_at(identifier, client, self.clock.now(), policy)
    }

    /// Resolve `identifier` as if the visit arrived at `now`.
    pub fn try_resolve_at(
        &self,
        identifier: &str,
        client: Option<IpAddr>,
        now: Instant,
        policy: &VerifyPolicy,
    ) -> Option<Resolution> {
        let mut pending = self.lock();
        let record = pending.remove(identifier)?;

        let elapsed = now.saturating_duration_since(record.started_at);
        let decision = decide(elapsed, client.as_ref(), policy);
        let delivered = record.signal.send(decision.outcome).is_ok();
        drop(pending);

        if !delivered {
            warn!(identifier, outcome = %decision.outcome, "waiter gone before resolution");
        }
        info!(
            identifier,
            outcome = %decision.outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            client = ?client,
            "resolved verification"
        );

        Some(Resolution {
            outcome: decision.outcome,
            elapsed,
            block_reason: decision.block_reason.map(str::to_owned),
            delivered,
        })
    }

    /// Time out every record older than `timeout` and drop abandoned ones.
    ///
    /// Waiters of expired records receive [`Outcome::TimedOut`]; a later
    /// visit for the same identifier finds nothing pending.
    pub fn sweep_expired(&self, timeout: Duration) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        self.lock().retain(|identifier, record| {
            if record.is_abandoned() {
                debug!(identifier = %identifier, "pruned abandoned wait record");
                report.abandoned += 1;
                return false;
            }
            if now.saturating_duration_since(record.started_at) < timeout {
                return true;
            }
            // retain() only lends the record, so swap the live sender out.
            let (placeholder, _) = oneshot::channel();
            let signal = std::mem::replace(&mut record.signal, placeholder);
            let _ = signal.send(Outcome::TimedOut);
            debug!(identifier = %identifier, "expired wait record");
            report.expired += 1;
            false
        });

        if report.expired > 0 || report.abandoned > 0 {
            info!(
                expired = report.expired,
                abandoned = report.abandoned,
                "swept wait records"
            );
        }
        report
    }

    /// Whether a caller is currently waiting on `identifier`.
    pub fn is_pending(&self, identifier: &str) -> bool {
        self.lock().contains_key(identifier)
    }

    /// How much longer `identifier` may be visited before it times out.
    ///
    /// `None` if nothing is pending; `Some(Duration::ZERO)` if the window
    /// has already closed but no visit or sweep has resolved it yet.
    pub fn remaining(&self, identifier: &str, timeout: Duration) -> Option<Duration> {
        let now = self.clock.now();
        self.lock().get(identifier).map(|record| {
            timeout.saturating_sub(now.saturating_duration_since(record.started_at))
        })
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for WaiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickgate_nullables::NullClock;
    use clickgate_types::BlockList;
    use std::net::Ipv4Addr;

    fn clean_addr() -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)))
    }

    fn setup(timeout_secs: u64) -> (Arc<NullClock>, WaiterRegistry, VerifyPolicy) {
        let clock = Arc::new(NullClock::new());
        let registry = WaiterRegistry::with_clock(clock.clone());
        let policy = VerifyPolicy::with_timeout(Duration::from_secs(timeout_secs));
        (clock, registry, policy)
    }

    #[tokio::test]
    async fn visit_in_time_fulfills_waiter() {
        let (clock, registry, policy) = setup(2);
        let visit = registry.register("abc").unwrap();

        clock.advance(Duration::from_secs(1));
        let res = registry.try_resolve("abc", clean_addr(), &policy).unwrap();
        assert_eq!(res.outcome, Outcome::Fulfilled);
        assert_eq!(res.elapsed, Duration::from_secs(1));
        assert!(res.delivered);

        assert_eq!(visit.wait().await.unwrap(), Outcome::Fulfilled);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn late_visit_times_out_waiter() {
        let (clock, registry, policy) = setup(1);
        let visit = registry.register("xyz").unwrap();

        clock.advance(Duration::from_secs(2));
        let res = registry.try_resolve("xyz", clean_addr(), &policy).unwrap();
        assert_eq!(res.outcome, Outcome::TimedOut);
        assert_eq!(visit.wait().await.unwrap(), Outcome::TimedOut);
    }

    #[tokio::test]
    async fn blocked_visit_reports_reason() {
        let (_clock, registry, _) = setup(1);
        let addr = IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9));
        let blocklist: BlockList = [(addr, "abuse")].into_iter().collect();
        let policy = VerifyPolicy::new(Duration::from_secs(1), blocklist);

        let visit = registry.register("q1").unwrap();
        let res = registry.try_resolve("q1", Some(addr), &policy).unwrap();
        assert_eq!(res.outcome, Outcome::Blocked);
        assert_eq!(res.block_reason.as_deref(), Some("abuse"));
        assert_eq!(visit.wait().await.unwrap(), Outcome::Blocked);
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let (_clock, registry, policy) = setup(1);
        assert!(registry.try_resolve("nope", clean_addr(), &policy).is_none());
    }

    #[test]
    fn second_visit_finds_nothing() {
        let (_clock, registry, policy) = setup(5);
        let _visit = registry.register("abc").unwrap();
        assert!(registry.try_resolve("abc", clean_addr(), &policy).is_some());
        assert!(registry.try_resolve("abc", clean_addr(), &policy).is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected_while_waiter_alive() {
        let (_clock, registry, _) = setup(5);
        let _first = registry.register("dup").unwrap();
        let err = registry.register("dup").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyPending(ref id) if id == "dup"));
    }

    #[tokio::test]
    async fn abandoned_registration_can_be_replaced() {
        let (_clock, registry, policy) = setup(5);
        drop(registry.register("dup").unwrap());

        let second = registry.register("dup").unwrap();
        registry.try_resolve("dup", clean_addr(), &policy).unwrap();
        assert_eq!(second.wait().await.unwrap(), Outcome::Fulfilled);
    }

    #[tokio::test]
    async fn reregistration_after_resolution_is_allowed() {
        let (_clock, registry, policy) = setup(5);
        let first = registry.register("again").unwrap();
        registry.try_resolve("again", clean_addr(), &policy).unwrap();
        assert_eq!(first.wait().await.unwrap(), Outcome::Fulfilled);

        let second = registry.register("again").unwrap();
        assert!(registry.is_pending("again"));
        drop(second);
    }

    #[tokio::test]
    async fn sweep_times_out_expired_records_only() {
        let (clock, registry, _) = setup(0);
        let old = registry.register("old").unwrap();
        clock.advance(Duration::from_secs(3));
        let fresh = registry.register("fresh").unwrap();
        drop(registry.register("gone").unwrap());

        let report = registry.sweep_expired(Duration::from_secs(2));
        assert_eq!(report, SweepReport { expired: 1, abandoned: 1 });
        assert_eq!(old.wait().await.unwrap(), Outcome::TimedOut);
        assert!(registry.is_pending("fresh"));
        assert!(!registry.is_pending("old"));
        drop(fresh);
    }

    #[test]
    fn remaining_counts_down_to_zero() {
        let (clock, registry, _) = setup(0);
        let timeout = Duration::from_secs(10);
        let _visit = registry.register("tick").unwrap();

        clock.advance(Duration::from_secs(4));
        assert_eq!(registry.remaining("tick", timeout), Some(Duration::from_secs(6)));
        clock.advance(Duration::from_secs(20));
        assert_eq!(registry.remaining("tick", timeout), Some(Duration::ZERO));
        assert_eq!(registry.remaining("other", timeout), None);
    }

    #[test]
    fn resolution_without_listener_is_not_delivered() {
        let (_clock, registry, policy) = setup(5);
        drop(registry.register("lonely").unwrap());
        let res = registry.try_resolve("lonely", clean_addr(), &policy).unwrap();
        assert!(!res.delivered);
    }

    #[test]
    fn blocking_waiter_is_woken_from_another_thread() {
        let registry = Arc::new(WaiterRegistry::new());
        let policy = VerifyPolicy::with_timeout(Duration::from_secs(60));

        let visit = registry.register("thread").unwrap();
        let waiter = std::thread::spawn(move || visit.wait_blocking());

        registry.try_resolve("thread", clean_addr(), &policy).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Outcome::Fulfilled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_visits_resolve_exactly_once() {
        let registry = Arc::new(WaiterRegistry::new());
        let policy = Arc::new(VerifyPolicy::with_timeout(Duration::from_secs(60)));

        for round in 0..50 {
            let id = format!("race-{round}");
            let visit = registry.register(id.clone()).unwrap();

            let visits: Vec<_> = (0..2)
                .map(|_| {
                    let registry = registry.clone();
                    let policy = policy.clone();
                    let id = id.clone();
                    tokio::spawn(async move { registry.try_resolve(&id, clean_addr(), &policy) })
                })
                .collect();

            let mut found = 0;
            for handle in visits {
                if handle.await.unwrap().is_some() {
                    found += 1;
                }
            }
            assert_eq!(found, 1, "exactly one visit must resolve {id}");
            assert_eq!(visit.wait().await.unwrap(), Outcome::Fulfilled);
        }
        assert!(registry.is_empty());
    }
}
