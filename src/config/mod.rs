//! Configuration module: structured loading from environment variables,
//! organized by domain (exchange, runtime flags, observability) and
//! composed into a single `Config`.

mod exchange_config;
mod observability_config;
mod runtime_config;

pub use exchange_config::ExchangeEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use runtime_config::RuntimeEnvConfig;

/// Aggregated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeEnvConfig,
    pub runtime: RuntimeEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            exchange: ExchangeEnvConfig::from_env(),
            runtime: RuntimeEnvConfig::from_env(),
            observability: ObservabilityEnvConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_composes_all_sub_configs() {
        let config = Config::from_env();
        assert!(!config.runtime.database_url.is_empty());
        assert!(!config.exchange.base_url.is_empty());
    }
}
