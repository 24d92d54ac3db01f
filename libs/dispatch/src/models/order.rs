//! Order model and its status enum

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Order status. `Pending` is initial; `Completed` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Counts toward the one-active-order-per-driver limit
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Accepted | OrderStatus::InProgress)
    }

    /// Statuses in which an order must carry a driver
    pub fn requires_driver(self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::InProgress | OrderStatus::Completed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Street address with city, postal code and country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Location as submitted by a customer; omitted parts take the service
/// area defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationDraft {
    pub address: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl LocationDraft {
    pub const DEFAULT_CITY: &'static str = "Zurich";
    pub const DEFAULT_COUNTRY: &'static str = "Switzerland";

    pub fn into_location(self) -> Location {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Location {
            address: self.address.trim().to_string(),
            city: or_default(self.city, Self::DEFAULT_CITY),
            postal_code: self.postal_code.map(|p| p.trim().to_string()).unwrap_or_default(),
            country: or_default(self.country, Self::DEFAULT_COUNTRY),
        }
    }
}

/// Airport transfer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    /// Contact snapshot taken at creation
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub pickup: Location,
    pub destination: Location,
    pub pickup_at: DateTime<Utc>,
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub passenger_count: i32,
    pub luggage_count: i32,
    pub special_requirements: Option<String>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub estimated_price: i64,
    pub final_price: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// `final_price` when set, otherwise `estimated_price`
    pub fn effective_price(&self) -> i64 {
        self.final_price.unwrap_or(self.estimated_price)
    }

    pub(crate) fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let hit = |value: &str| value.to_lowercase().contains(&needle);

        hit(&self.customer_name)
            || hit(&self.customer_phone)
            || hit(&self.customer_email)
            || hit(&self.pickup.address)
            || hit(&self.destination.address)
            || self.flight_number.as_deref().is_some_and(hit)
            || self.airline.as_deref().is_some_and(hit)
            || hit(&self.id.to_string())
    }
}

/// Order creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Contact overrides; each falls back to the customer's profile
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub pickup: LocationDraft,
    pub destination: LocationDraft,
    pub pickup_at: DateTime<Utc>,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub airline: Option<String>,
    pub passenger_count: i32,
    #[serde(default)]
    pub luggage_count: Option<i32>,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("archived".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_classification() {
        assert!(OrderStatus::Accepted.is_active());
        assert!(OrderStatus::InProgress.is_active());
        assert!(!OrderStatus::Completed.is_active());
        assert!(OrderStatus::Completed.requires_driver());
        assert!(!OrderStatus::Cancelled.requires_driver());
        assert!(!OrderStatus::Pending.requires_driver());
    }

    #[test]
    fn location_draft_fills_service_area_defaults() {
        let location = LocationDraft {
            address: "  Flughafen Zurich ".to_string(),
            city: Some("   ".to_string()),
            postal_code: None,
            country: None,
        }
        .into_location();

        assert_eq!(location.address, "Flughafen Zurich");
        assert_eq!(location.city, "Zurich");
        assert_eq!(location.postal_code, "");
        assert_eq!(location.country, "Switzerland");
    }
}
