use std::env;

/// Process-wide run-mode flags (spec §6): `simulate_trades` forces the
/// executor to bypass broker submission and compute outputs analytically;
/// `use_mock_data` likewise bypasses balance reads.
#[derive(Debug, Clone)]
pub struct RuntimeEnvConfig {
    pub database_url: String,
    pub simulate_trades: bool,
    pub use_mock_data: bool,
    pub lock_sweep_interval_seconds: u64,
    pub reconciliation_interval_seconds: u64,
}

impl RuntimeEnvConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/rebalancer.db".to_string()),
            simulate_trades: env::var("SIMULATE_TRADES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            use_mock_data: env::var("USE_MOCK_DATA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            lock_sweep_interval_seconds: env::var("LOCK_SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            reconciliation_interval_seconds: env::var("RECONCILIATION_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
        }
    }
}
