//! Prometheus metrics for the node
//!
//! Each [`Metrics`] owns its own registry so tests can build several nodes in
//! one process without name collisions.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct Metrics {
    pub attestations_signed_total: IntCounter,
    pub messages_sent_total: IntCounter,
    pub messages_delivered_total: IntCounter,
    /// Failed delivery attempts, labelled by error kind
    pub delivery_failures_total: IntCounterVec,
    pub messages_abandoned_total: IntCounter,
    pub pending_queue_depth: IntGauge,
    /// Sum of all lock ledger entries, in base units (saturates at i64::MAX)
    pub total_locked: IntGauge,
    pub settled_cache_size: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let attestations_signed_total = IntCounter::new(
            "bridge_attestations_signed_total",
            "Total number of attestations signed by local attester workers",
        )
        .expect("constant metric name is valid");

        let messages_sent_total = IntCounter::new(
            "bridge_messages_sent_total",
            "Total number of messages observed in Sent state",
        )
        .expect("constant metric name is valid");

        let messages_delivered_total = IntCounter::new(
            "bridge_messages_delivered_total",
            "Total number of messages processed on their destination",
        )
        .expect("constant metric name is valid");

        let delivery_failures_total = IntCounterVec::new(
            Opts::new(
                "bridge_delivery_failures_total",
                "Failed delivery attempts by error kind",
            ),
            &["kind"],
        )
        .expect("constant metric name is valid");

        let messages_abandoned_total = IntCounter::new(
            "bridge_messages_abandoned_total",
            "Messages dropped after a terminal delivery error",
        )
        .expect("constant metric name is valid");

        let pending_queue_depth = IntGauge::new(
            "bridge_pending_queue_depth",
            "Messages awaiting quorum or delivery",
        )
        .expect("constant metric name is valid");

        let total_locked = IntGauge::new(
            "bridge_total_locked",
            "Value in transit across all lock ledger entries",
        )
        .expect("constant metric name is valid");

        let settled_cache_size = IntGauge::new(
            "bridge_settled_cache_size",
            "Current entries in the relayer's settled-message cache",
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration runs once per registry
        registry
            .register(Box::new(attestations_signed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(messages_sent_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(messages_delivered_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(delivery_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(messages_abandoned_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(pending_queue_depth.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(total_locked.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(settled_cache_size.clone()))
            .expect("metric registration must not be called twice");

        Self {
            attestations_signed_total,
            messages_sent_total,
            messages_delivered_total,
            delivery_failures_total,
            messages_abandoned_total,
            pending_queue_depth,
            total_locked,
            settled_cache_size,
            registry,
        }
    }

    pub fn record_delivery_failure(&self, kind: &str) {
        self.delivery_failures_total.with_label_values(&[kind]).inc();
    }

    pub fn set_total_locked(&self, value: u128) {
        self.total_locked
            .set(i64::try_from(value).unwrap_or(i64::MAX));
    }
}
