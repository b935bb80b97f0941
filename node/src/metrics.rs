//! Prometheus metrics for the validator node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] so an
//! external exporter can encode everything in one pass without touching
//! process-global state.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of validator-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Claims accepted into the queue.
    pub claims_submitted: IntCounter,
    /// Claims handed to the dispatch scheduler.
    pub claims_dispatched: IntCounter,
    /// Verification requests issued to miners.
    pub requests_issued: IntCounter,
    /// Requests that ended in timeout or connection failure.
    pub requests_timed_out: IntCounter,
    /// Responses admitted into a round.
    pub responses_admitted: IntCounter,
    /// Responses rejected at admission (stale, duplicate, unknown round).
    pub responses_rejected: IntCounter,
    /// Responses that drew an attributable-fault penalty.
    pub responses_faulted: IntCounter,
    /// Rounds finalized with a verdict.
    pub rounds_finalized: IntCounter,
    /// Rounds expired without quorum.
    pub rounds_expired: IntCounter,
    /// Weight snapshots emitted.
    pub snapshots_emitted: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Currently active miners in the registry.
    pub active_miners: IntGauge,
    /// Rounds currently live in the aggregator.
    pub live_rounds: IntGauge,
    /// Claims waiting in the queue.
    pub queued_claims: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from round open to settle, in milliseconds.
    pub round_settle_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics registered under a new [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .expect("metric registration on a fresh registry cannot collide")
        };
        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(Opts::new(name, help), registry)
                .expect("metric registration on a fresh registry cannot collide")
        };

        let round_settle_ms = register_histogram_with_registry!(
            HistogramOpts::new("attest_round_settle_ms", "Round open-to-settle time (ms)")
                .buckets(vec![
                    50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0,
                    60_000.0,
                ]),
            registry
        )
        .expect("histogram registration on a fresh registry cannot collide");

        Self {
            claims_submitted: counter("attest_claims_submitted_total", "Claims accepted into the queue"),
            claims_dispatched: counter("attest_claims_dispatched_total", "Claims dispatched to miners"),
            requests_issued: counter("attest_requests_issued_total", "Verification requests issued"),
            requests_timed_out: counter(
                "attest_requests_timed_out_total",
                "Requests with no response in time",
            ),
            responses_admitted: counter("attest_responses_admitted_total", "Responses admitted"),
            responses_rejected: counter("attest_responses_rejected_total", "Responses rejected"),
            responses_faulted: counter(
                "attest_responses_faulted_total",
                "Responses penalized as attributable faults",
            ),
            rounds_finalized: counter("attest_rounds_finalized_total", "Rounds finalized with a verdict"),
            rounds_expired: counter("attest_rounds_expired_total", "Rounds expired without quorum"),
            snapshots_emitted: counter("attest_snapshots_emitted_total", "Weight snapshots emitted"),
            active_miners: gauge("attest_active_miners", "Active miners in the registry"),
            live_rounds: gauge("attest_live_rounds", "Live consensus rounds"),
            queued_claims: gauge("attest_queued_claims", "Claims waiting for dispatch"),
            round_settle_ms,
            registry,
        }
    }

    /// Encode all metrics in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buf)
            .expect("text encoding of gathered metrics cannot fail");
        String::from_utf8(buf).expect("prometheus text format is valid UTF-8")
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
