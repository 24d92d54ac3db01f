//! Price estimation at order creation
//!
//! The reference policy is `base × distance factor × passenger surcharge`,
//! rounded to whole currency units. The distance factor is a placeholder for
//! a routing engine: it is read off a SHA-256 digest of the itinerary, so the
//! same pickup and destination price the same across processes, builds and
//! releases.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Location;

/// Pluggable price estimator
pub trait PricingPolicy: Send + Sync {
    fn estimate(&self, pickup: &Location, destination: &Location, passenger_count: i32) -> i64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub min_distance_factor: f64,
    pub max_distance_factor: f64,
    /// Parties strictly larger than this pay the surcharge
    pub surcharge_threshold: i32,
    pub passenger_surcharge: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 35.0,
            min_distance_factor: 0.8,
            max_distance_factor: 1.3,
            surcharge_threshold: 2,
            passenger_surcharge: 1.2,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_fare <= 0.0 {
            return Err("pricing.base_fare must be positive".to_string());
        }
        if self.min_distance_factor <= 0.0 || self.min_distance_factor > self.max_distance_factor {
            return Err(
                "pricing distance factors must satisfy 0 < min_distance_factor <= max_distance_factor"
                    .to_string(),
            );
        }
        if self.passenger_surcharge < 1.0 {
            return Err("pricing.passenger_surcharge must be at least 1.0".to_string());
        }
        Ok(())
    }
}

/// Reference pricing policy
#[derive(Debug, Clone)]
pub struct ReferencePricing {
    config: PricingConfig,
    fixed_factor: Option<f64>,
}

impl ReferencePricing {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config,
            fixed_factor: None,
        }
    }

    /// Policy whose distance factor is pinned, isolating the surcharge rule
    pub fn with_fixed_factor(config: PricingConfig, factor: f64) -> Self {
        Self {
            config,
            fixed_factor: Some(factor),
        }
    }

    pub fn distance_factor(&self, pickup: &Location, destination: &Location) -> f64 {
        if let Some(factor) = self.fixed_factor {
            return factor;
        }

        let (min, max) = (
            self.config.min_distance_factor,
            self.config.max_distance_factor,
        );
        if min >= max {
            return min;
        }

        min + itinerary_unit(pickup, destination) * (max - min)
    }

    pub fn passenger_multiplier(&self, passenger_count: i32) -> f64 {
        if passenger_count > self.config.surcharge_threshold {
            self.config.passenger_surcharge
        } else {
            1.0
        }
    }
}

/// Uniform value in `[0, 1)` taken from the top 53 bits of the itinerary
/// digest. Parts are trimmed, lowercased and separated by U+001F.
fn itinerary_unit(pickup: &Location, destination: &Location) -> f64 {
    let mut hasher = Sha256::new();
    for part in [
        &pickup.address,
        &pickup.city,
        &destination.address,
        &destination.city,
    ] {
        hasher.update(part.trim().to_lowercase().as_bytes());
        hasher.update([0x1f]);
    }

    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) >> 11) as f64 / (1u64 << 53) as f64
}

impl PricingPolicy for ReferencePricing {
    fn estimate(&self, pickup: &Location, destination: &Location, passenger_count: i32) -> i64 {
        let price = self.config.base_fare
            * self.distance_factor(pickup, destination)
            * self.passenger_multiplier(passenger_count);
        price.round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(address: &str) -> Location {
        Location {
            address: address.to_string(),
            city: "Zurich".to_string(),
            postal_code: "8058".to_string(),
            country: "Switzerland".to_string(),
        }
    }

    #[test]
    fn three_passengers_pay_the_surcharge() {
        let pricing = ReferencePricing::with_fixed_factor(PricingConfig::default(), 1.0);
        let price = pricing.estimate(&location("Flughafen"), &location("Bahnhofstrasse 1"), 3);
        assert_eq!(price, 42);
    }

    #[test]
    fn two_passengers_pay_base_only() {
        let pricing = ReferencePricing::with_fixed_factor(PricingConfig::default(), 1.0);
        let price = pricing.estimate(&location("Flughafen"), &location("Bahnhofstrasse 1"), 2);
        assert_eq!(price, 35);
    }

    #[test]
    fn price_rounds_to_nearest_unit() {
        // 35 * 1.3 * 1.2 = 54.6
        let pricing = ReferencePricing::with_fixed_factor(PricingConfig::default(), 1.3);
        let price = pricing.estimate(&location("A"), &location("B"), 4);
        assert_eq!(price, 55);
    }

    #[test]
    fn same_itinerary_prices_identically() {
        let pricing = ReferencePricing::new(PricingConfig::default());
        let first = pricing.estimate(&location("Flughafen"), &location("Seefeldstrasse 12"), 1);
        let second = pricing.estimate(&location(" flughafen "), &location("Seefeldstrasse 12"), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn itinerary_price_is_pinned() {
        let pricing = ReferencePricing::new(PricingConfig::default());
        let pickup = Location {
            address: "Flughafen Zurich, Terminal 1".to_string(),
            ..location("")
        };
        let destination = location("Bahnhofstrasse 10");

        let factor = pricing.distance_factor(&pickup, &destination);
        assert!((factor - 1.057_566_720_484_559).abs() < 1e-12, "factor {factor}");
        assert_eq!(pricing.estimate(&pickup, &destination, 2), 37);
        assert_eq!(pricing.estimate(&pickup, &destination, 3), 44);
    }

    #[test]
    fn distance_factor_stays_in_configured_band() {
        let pricing = ReferencePricing::new(PricingConfig::default());
        for n in 0..50 {
            let factor = pricing.distance_factor(&location(&format!("Street {n}")), &location("Airport"));
            assert!((0.8..=1.3).contains(&factor), "factor {factor} out of band");
        }
    }

    #[test]
    fn inverted_factor_band_is_rejected() {
        let config = PricingConfig {
            min_distance_factor: 1.5,
            max_distance_factor: 1.0,
            ..PricingConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PricingConfig::default().validate().is_ok());
    }
}
