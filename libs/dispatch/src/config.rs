//! Policy configuration for the dispatch core

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::pricing::PricingConfig;

/// Tunables for listing, matching and validation.
///
/// Loaded from `DISPATCH__*` environment variables over the defaults, e.g.
/// `DISPATCH__URGENT_WINDOW_HOURS=3` or `DISPATCH__PRICING__BASE_FARE=40`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Orders whose pickup is this many hours away or less are urgent
    pub urgent_window_hours: i64,
    /// Orders shown in the stats "recent" list
    pub recent_orders_limit: usize,
    /// Automatic retries of a claim after transient store contention
    pub claim_retry_attempts: u32,
    pub max_passengers: i32,
    pub max_luggage: i32,
    pub pricing: PricingConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            urgent_window_hours: 2,
            recent_orders_limit: 5,
            claim_retry_attempts: 1,
            max_passengers: 8,
            max_luggage: 8,
            pricing: PricingConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: DispatchConfig = Config::builder()
            .add_source(
                Environment::with_prefix("DISPATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.urgent_window_hours < 0 {
            return Err("urgent_window_hours must not be negative".to_string());
        }
        if self.max_passengers < 1 {
            return Err("max_passengers must be at least 1".to_string());
        }
        if self.max_luggage < 0 {
            return Err("max_luggage must not be negative".to_string());
        }
        self.pricing.validate()
    }
}
