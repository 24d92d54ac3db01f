//! Driver performance summary, derived on demand from the order history

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    actor::{Actor, Session},
    error::{DispatchError, DispatchResult},
    marketplace::Marketplace,
    models::{Order, OrderStatus},
    store::{OrderQuery, OrderSort},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentOrder {
    pub id: Uuid,
    pub status: OrderStatus,
    pub pickup_address: String,
    pub destination_address: String,
    pub pickup_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub price: i64,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub driver_id: Uuid,
    pub total_orders: u64,
    pub completed_orders: u64,
    pub active_orders: u64,
    /// Percentage, 0 when the driver has no orders
    pub completion_rate: u32,
    pub monthly_earnings: i64,
    pub monthly_trips: u64,
    pub total_earnings: i64,
    pub rating: Option<f64>,
    pub total_trips: Option<i64>,
    pub recent_orders: Vec<RecentOrder>,
}

/// First instant of the calendar month containing `now`, in UTC
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

pub fn completion_rate(completed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

impl Marketplace {
    /// Stats for `driver_id`; only that driver may read them
    pub async fn driver_stats(&self, session: &Session, driver_id: Uuid) -> DispatchResult<DriverStats> {
        let (actor, driver) = self.resolve(session).await?;
        match actor {
            Actor::Driver(id) if id == driver_id => {}
            Actor::Driver(_) | Actor::Customer(_) => {
                return Err(DispatchError::Forbidden(
                    "drivers can only read their own stats".to_string(),
                ));
            }
        }

        let orders = self
            .store
            .find_orders(&OrderQuery {
                driver_id: Some(driver_id),
                sort: OrderSort::NEWEST_FIRST,
                ..OrderQuery::default()
            })
            .await?;

        let since = month_start(self.now());
        let completed: Vec<&Order> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .collect();
        let this_month: Vec<&Order> = completed
            .iter()
            .copied()
            .filter(|o| o.completed_at.is_some_and(|at| at >= since))
            .collect();

        let total_orders = orders.len() as u64;
        let completed_orders = completed.len() as u64;

        let recent: Vec<&Order> = orders.iter().take(self.config.recent_orders_limit).collect();
        let customer_ids: Vec<Uuid> = recent.iter().map(|o| o.customer_id).collect();
        let names: HashMap<Uuid, String> = self
            .store
            .get_users(&customer_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let recent_orders = recent
            .into_iter()
            .map(|o| RecentOrder {
                id: o.id,
                status: o.status,
                pickup_address: o.pickup.address.clone(),
                destination_address: o.destination.address.clone(),
                pickup_at: o.pickup_at,
                created_at: o.created_at,
                price: o.effective_price(),
                customer_name: names
                    .get(&o.customer_id)
                    .cloned()
                    .unwrap_or_else(|| o.customer_name.clone()),
            })
            .collect();

        let profile = driver.driver_profile.as_ref();
        Ok(DriverStats {
            driver_id,
            total_orders,
            completed_orders,
            active_orders: orders.iter().filter(|o| o.status.is_active()).count() as u64,
            completion_rate: completion_rate(completed_orders, total_orders),
            monthly_earnings: this_month.iter().map(|o| o.effective_price()).sum(),
            monthly_trips: this_month.len() as u64,
            total_earnings: completed.iter().map(|o| o.effective_price()).sum(),
            rating: profile.map(|p| p.rating),
            total_trips: profile.map(|p| p.total_trips),
            recent_orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn completion_rate_rounds_and_handles_empty_history() {
        assert_eq!(completion_rate(7, 10), 70);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(0, 0), 0);
    }

    #[test]
    fn month_start_is_first_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 5).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());
    }
}
