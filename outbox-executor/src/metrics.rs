//! Prometheus metrics for the two HTTP-shaped surfaces of the process: the
//! enqueue API and the remote dispatch path.
//!
//! Mirrors two distinct files from the original source rather than one:
//! `server/internal/server/metrics.go` (`transaction_enqueue_requests_total`
//! / `in_flight_transaction_enqueue_requests` /
//! `transaction_enqueue_request_duration_seconds`, wrapping the enqueue
//! handler via `promhttp.InstrumentHandler*`) and
//! `server/internal/transaction/metrics.go` (`transaction_executions_total`
//! / `in_flight_transaction_executions` /
//! `transaction_execution_duration_seconds`, wrapping each outbound call).
//! Both groups share one registry so `/metrics` exposes all six.

use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::time::Duration;

const DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 3.0, 5.0];

pub struct Metrics {
    registry: Registry,
    pub enqueue_requests_total: IntCounterVec,
    pub enqueue_in_flight: IntGauge,
    pub enqueue_duration_seconds: HistogramVec,
    dispatch_executions_total: IntCounterVec,
    pub dispatch_in_flight: IntGauge,
    dispatch_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let enqueue_requests_total = IntCounterVec::new(
            prometheus::Opts::new(
                "transaction_enqueue_requests_total",
                "A counter for transaction enqueue requests.",
            ),
            &["code"],
        )?;
        let enqueue_in_flight = IntGauge::new(
            "in_flight_transaction_enqueue_requests",
            "A gauge of transaction enqueue requests currently being served.",
        )?;
        let enqueue_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transaction_enqueue_request_duration_seconds",
                "A histogram of latencies for transaction enqueue requests.",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["code"],
        )?;

        let dispatch_executions_total = IntCounterVec::new(
            prometheus::Opts::new(
                "transaction_executions_total",
                "A counter for executed remote transactions.",
            ),
            &["code"],
        )?;
        let dispatch_in_flight = IntGauge::new(
            "in_flight_transaction_executions",
            "A gauge of remote transactions currently being executed.",
        )?;
        let dispatch_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transaction_execution_duration_seconds",
                "A histogram of latencies for transaction executions.",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["code"],
        )?;

        registry.register(Box::new(enqueue_requests_total.clone()))?;
        registry.register(Box::new(enqueue_in_flight.clone()))?;
        registry.register(Box::new(enqueue_duration_seconds.clone()))?;
        registry.register(Box::new(dispatch_executions_total.clone()))?;
        registry.register(Box::new(dispatch_in_flight.clone()))?;
        registry.register(Box::new(dispatch_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            enqueue_requests_total,
            enqueue_in_flight,
            enqueue_duration_seconds,
            dispatch_executions_total,
            dispatch_in_flight,
            dispatch_duration_seconds,
        })
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Record one outbound dispatch attempt: `code` is the observed HTTP
    /// status, or `None` on a transport error. Called once per attempt, so
    /// a retried transaction contributes one observation per retry.
    pub fn observe_dispatch(&self, code: Option<u16>, elapsed: Duration) {
        let label = code.map(|c| c.to_string()).unwrap_or_else(|| "error".to_string());
        self.dispatch_executions_total
            .with_label_values(&[&label])
            .inc();
        self.dispatch_duration_seconds
            .with_label_values(&[&label])
            .observe(elapsed.as_secs_f64());
    }
}

/// Increments a gauge on construction, decrements it on drop — the
/// `in_flight` half of `promhttp.InstrumentHandlerInFlight`, generalized to
/// any in-flight gauge (enqueue requests or outbound dispatch attempts).
pub struct InFlightGuard<'a> {
    gauge: &'a IntGauge,
}

impl<'a> InFlightGuard<'a> {
    pub fn new(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
