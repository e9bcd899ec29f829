//! Prometheus metrics for the verification endpoint.
//!
//! [`VerifyMetrics`] owns a dedicated [`Registry`] that the `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use clickgate_types::Outcome;

const UNMATCHED: &str = "unmatched";

pub struct VerifyMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,
    /// Visits by result: `fulfilled`, `timed_out`, `blocked` or `unmatched`.
    pub visits: IntCounterVec,
    /// Records timed out by the background sweep rather than a visit.
    pub swept_expired: IntCounter,
    /// Records currently waiting for a visit. Refreshed on scrape.
    pub pending: IntGauge,
}

impl VerifyMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let visits = register_int_counter_vec_with_registry!(
            Opts::new(
                "clickgate_visits_total",
                "Verification visits by result"
            ),
            &["result"],
            registry
        )
        .expect("failed to register visits counter");

        let swept_expired = register_int_counter_with_registry!(
            Opts::new(
                "clickgate_swept_expired_total",
                "Pending verifications timed out by the background sweep"
            ),
            registry
        )
        .expect("failed to register swept_expired counter");

        let pending = register_int_gauge_with_registry!(
            Opts::new(
                "clickgate_pending",
                "Verifications currently waiting for a visit"
            ),
            registry
        )
        .expect("failed to register pending gauge");

        Self {
            registry,
            visits,
            swept_expired,
            pending,
        }
    }

    /// Count one visit. `None` means nothing was pending for the identifier.
    pub fn record_visit(&self, outcome: Option<Outcome>) {
        let label = outcome.as_ref().map_or(UNMATCHED, Outcome::as_str);
        self.visits.with_label_values(&[label]).inc();
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for VerifyMetrics {
    fn default() -> Self {
        Self::new()
    }
}
