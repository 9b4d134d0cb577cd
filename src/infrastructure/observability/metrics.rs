//! Prometheus metrics definitions.
//!
//! All metrics use the `rebalancer_` prefix and are read-only outside of
//! this module's own setters. Scoped to the concerns this system actually
//! has: swap/lock/trade throughput and broker latency, not portfolio P&L.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub active_bots: GenericGauge<AtomicF64>,
    pub active_locks: GenericGauge<AtomicF64>,
    pub uptime_seconds: GenericGauge<AtomicF64>,
    pub swaps_total: CounterVec,
    pub trades_total: CounterVec,
    pub lock_conflicts_total: CounterVec,
    pub broker_api_latency_seconds: HistogramVec,
    pub circuit_breaker_status: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let active_bots =
            Gauge::with_opts(Opts::new("rebalancer_active_bots", "Number of running bot loops"))?;
        registry.register(Box::new(active_bots.clone()))?;

        let active_locks = Gauge::with_opts(Opts::new(
            "rebalancer_active_locks",
            "Number of currently held asset locks",
        ))?;
        registry.register(Box::new(active_locks.clone()))?;

        let uptime_seconds =
            Gauge::with_opts(Opts::new("rebalancer_uptime_seconds", "Process uptime in seconds"))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let swaps_total = CounterVec::new(
            Opts::new("rebalancer_swaps_total", "Swap decisions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(swaps_total.clone()))?;

        let trades_total = CounterVec::new(
            Opts::new("rebalancer_trades_total", "Executed trades by status"),
            &["status"],
        )?;
        registry.register(Box::new(trades_total.clone()))?;

        let lock_conflicts_total = CounterVec::new(
            Opts::new(
                "rebalancer_lock_conflicts_total",
                "Asset lock acquisition conflicts by coin",
            ),
            &["coin"],
        )?;
        registry.register(Box::new(lock_conflicts_total.clone()))?;

        let broker_api_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rebalancer_broker_api_latency_seconds",
                "Broker API request latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(broker_api_latency_seconds.clone()))?;

        let circuit_breaker_status = Gauge::with_opts(Opts::new(
            "rebalancer_circuit_breaker_status",
            "Broker circuit breaker status (0=closed, 1=open)",
        ))?;
        registry.register(Box::new(circuit_breaker_status.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            active_bots,
            active_locks,
            uptime_seconds,
            swaps_total,
            trades_total,
            lock_conflicts_total,
            broker_api_latency_seconds,
            circuit_breaker_status,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_swap(&self, outcome: &str) {
        self.swaps_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_trade(&self, status: &str) {
        self.trades_total.with_label_values(&[status]).inc();
    }

    pub fn inc_lock_conflict(&self, coin: &str) {
        self.lock_conflicts_total.with_label_values(&[coin]).inc();
    }

    pub fn observe_broker_latency(&self, endpoint: &str, latency_secs: f64) {
        self.broker_api_latency_seconds
            .with_label_values(&[endpoint])
            .observe(latency_secs);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default Metrics")
    }
}
