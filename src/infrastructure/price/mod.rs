pub mod aggregator_provider;
pub mod broker_rate_provider;
