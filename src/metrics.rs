//! Metrics about the discovery process itself.
//!
//! [`Metrics`] is built once at startup and handed to every component that
//! records something; there is no global registry.
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::discovery::SkipReason;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    events_received: IntCounterVec,
    containers_added: IntCounter,
    containers_removed: IntCounter,
    containers_skipped: IntCounterVec,
    inspect_failures: IntCounter,
    polls: IntCounter,
    poll_failures: IntCounter,
    flushes: IntCounter,
    flush_failures: IntCounter,
    managed_containers: IntGauge,
}

impl Metrics {
    /// Creates and registers all collectors under `namespace` and `subsystem`.
    /// Empty strings are omitted from the metric names.
    pub fn new(namespace: &str, subsystem: &str) -> prometheus::Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace)
                .subsystem(subsystem)
        };
        let registry = Registry::new();

        let events_received = IntCounterVec::new(
            opts("events_received_total", "Container lifecycle events handled"),
            &["action"],
        )?;
        let containers_added = IntCounter::with_opts(opts(
            "containers_added_total",
            "Containers added to the discovery document",
        ))?;
        let containers_removed = IntCounter::with_opts(opts(
            "containers_removed_total",
            "Containers removed from the discovery document",
        ))?;
        let containers_skipped = IntCounterVec::new(
            opts(
                "containers_skipped_total",
                "Containers that could not be resolved to a target",
            ),
            &["reason"],
        )?;
        let inspect_failures = IntCounter::with_opts(opts(
            "inspect_failures_total",
            "Failed container inspections",
        ))?;
        let polls = IntCounter::with_opts(opts("polls_total", "Container listings performed"))?;
        let poll_failures =
            IntCounter::with_opts(opts("poll_failures_total", "Failed container listings"))?;
        let flushes = IntCounter::with_opts(opts(
            "flushes_total",
            "Writes of the discovery document",
        ))?;
        let flush_failures = IntCounter::with_opts(opts(
            "flush_failures_total",
            "Failed writes of the discovery document",
        ))?;
        let managed_containers = IntGauge::with_opts(opts(
            "managed_containers",
            "Containers currently in the discovery document",
        ))?;

        registry.register(Box::new(events_received.clone()))?;
        registry.register(Box::new(containers_added.clone()))?;
        registry.register(Box::new(containers_removed.clone()))?;
        registry.register(Box::new(containers_skipped.clone()))?;
        registry.register(Box::new(inspect_failures.clone()))?;
        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;
        registry.register(Box::new(flushes.clone()))?;
        registry.register(Box::new(flush_failures.clone()))?;
        registry.register(Box::new(managed_containers.clone()))?;

        Ok(Self {
            registry,
            events_received,
            containers_added,
            containers_removed,
            containers_skipped,
            inspect_failures,
            polls,
            poll_failures,
            flushes,
            flush_failures,
            managed_containers,
        })
    }

    pub fn record_event(&self, action: &str) {
        self.events_received.with_label_values(&[action]).inc();
    }

    pub fn record_added(&self) {
        self.containers_added.inc();
    }

    pub fn record_removed(&self) {
        self.containers_removed.inc();
    }

    pub fn record_skipped(&self, reason: &SkipReason) {
        self.containers_skipped
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn record_inspect_failure(&self) {
        self.inspect_failures.inc();
    }

    pub fn record_poll(&self, ok: bool) {
        self.polls.inc();
        if !ok {
            self.poll_failures.inc();
        }
    }

    pub fn record_flush(&self, ok: bool, managed: usize) {
        self.flushes.inc();
        if !ok {
            self.flush_failures.inc();
        }
        self.managed_containers.set(managed as i64);
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
