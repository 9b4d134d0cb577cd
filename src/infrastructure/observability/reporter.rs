//! Push-based metrics reporter.
//!
//! Periodically outputs a structured JSON snapshot to stdout. No HTTP
//! server, no incoming connections — only outbound logging, matching the
//! observability posture this system needs (a handful of bot loops, not a
//! public-facing service).

use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub active_bots: u64,
    pub active_locks: u64,
}

pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
    active_bots_probe: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, interval_seconds: u64, active_bots_probe: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
            active_bots_probe: Box::new(active_bots_probe),
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "MetricsReporter: starting push-based metrics");

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    println!("METRICS_JSON:{json}");
                    info!(
                        active_bots = snapshot.active_bots,
                        uptime_seconds = snapshot.uptime_seconds,
                        "metrics snapshot emitted"
                    );
                }
                Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
            }
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        let active_bots = (self.active_bots_probe)();

        self.metrics.uptime_seconds.set(uptime as f64);
        self.metrics.active_bots.set(active_bots as f64);

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_bots,
            active_locks: self.metrics.active_locks.get() as u64,
        }
    }
}
