//! Role-scoped order listings with read-time enrichment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use crate::{
    actor::{Actor, Session},
    error::DispatchResult,
    marketplace::Marketplace,
    models::{Order, OrderStatus, User, Vehicle},
    store::{OrderQuery, OrderSort, SortDirection, SortField},
};

/// Which orders a driver is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverScope {
    /// Unclaimed pending orders, soonest pickup first
    #[default]
    Available,
    /// Orders assigned to the driver, newest first
    Mine,
}

/// Listing filters. `scope` only applies to drivers; the status filter is
/// ignored for the available scope, which is pending by definition.
/// Without `order`, the scope's default field keeps its default direction
/// and any other field sorts descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilters {
    pub scope: Option<DriverScope>,
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub sort_by: Option<SortField>,
    pub order: Option<SortDirection>,
}

/// Customer contact as shown to the assigned driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Driver's public profile as shown to the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverContact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub vehicle: Option<Vehicle>,
    pub rating: Option<f64>,
    pub total_trips: Option<i64>,
}

impl DriverContact {
    fn of(user: &User) -> Self {
        let profile = user.driver_profile.as_ref();
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            vehicle: profile.map(|p| p.vehicle.clone()),
            rating: profile.map(|p| p.rating),
            total_trips: profile.map(|p| p.total_trips),
        }
    }
}

/// Order joined with both parties and the derived urgency fields.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub customer: CustomerContact,
    pub driver: Option<DriverContact>,
    pub hours_until_pickup: i64,
    pub is_urgent: bool,
}

/// Whole hours until pickup, rounded to nearest (half away from zero)
pub fn hours_until_pickup(pickup_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (pickup_at - now).num_milliseconds() as f64;
    (millis / 3_600_000.0).round() as i64
}

pub fn is_urgent(hours_until_pickup: i64, window_hours: i64) -> bool {
    hours_until_pickup > 0 && hours_until_pickup <= window_hours
}

impl Marketplace {
    /// List orders visible to the caller.
    ///
    /// Customers see their own orders. Drivers see either the unclaimed
    /// pool or their own assignments.
    pub async fn list_orders(
        &self,
        session: &Session,
        filters: OrderFilters,
    ) -> DispatchResult<Vec<EnrichedOrder>> {
        let (actor, _) = self.resolve(session).await?;

        let (mut query, default_sort) = match actor {
            Actor::Customer(id) => (
                OrderQuery {
                    customer_id: Some(id),
                    status: filters.status,
                    ..OrderQuery::default()
                },
                OrderSort::NEWEST_FIRST,
            ),
            Actor::Driver(id) => match filters.scope.unwrap_or_default() {
                DriverScope::Available => (
                    OrderQuery {
                        status: Some(OrderStatus::Pending),
                        unclaimed: true,
                        ..OrderQuery::default()
                    },
                    OrderSort::SOONEST_PICKUP_FIRST,
                ),
                DriverScope::Mine => (
                    OrderQuery {
                        driver_id: Some(id),
                        status: filters.status,
                        ..OrderQuery::default()
                    },
                    OrderSort::NEWEST_FIRST,
                ),
            },
        };

        query.search = filters.search;
        let field = filters.sort_by.unwrap_or(default_sort.field);
        let direction = filters.order.unwrap_or(if field == default_sort.field {
            default_sort.direction
        } else {
            SortDirection::Desc
        });
        query.sort = OrderSort { field, direction };

        let orders = self.store.find_orders(&query).await?;
        self.enrich(orders).await
    }

    /// Join both parties and compute urgency. Dangling user references fall
    /// back to the order's contact snapshot instead of failing the query.
    pub(crate) async fn enrich(&self, orders: Vec<Order>) -> DispatchResult<Vec<EnrichedOrder>> {
        let ids: Vec<Uuid> = orders
            .iter()
            .flat_map(|o| std::iter::once(o.customer_id).chain(o.driver_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let users: HashMap<Uuid, User> = self
            .store
            .get_users(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let now = self.now();
        let window = self.config.urgent_window_hours;

        Ok(orders
            .into_iter()
            .map(|order| {
                let customer = match users.get(&order.customer_id) {
                    Some(user) => CustomerContact {
                        id: user.id,
                        name: user.name.clone(),
                        phone: user.phone.clone(),
                        email: user.email.clone(),
                    },
                    None => {
                        warn!(order_id = %order.id, customer_id = %order.customer_id, "customer reference is dangling, using snapshot");
                        CustomerContact {
                            id: order.customer_id,
                            name: order.customer_name.clone(),
                            phone: order.customer_phone.clone(),
                            email: order.customer_email.clone(),
                        }
                    }
                };

                let driver = order.driver_id.and_then(|driver_id| match users.get(&driver_id) {
                    Some(user) => Some(DriverContact::of(user)),
                    None => {
                        warn!(order_id = %order.id, %driver_id, "driver reference is dangling");
                        None
                    }
                });

                let hours = hours_until_pickup(order.pickup_at, now);
                EnrichedOrder {
                    customer,
                    driver,
                    hours_until_pickup: hours,
                    is_urgent: is_urgent(hours, window),
                    order,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ninety_minutes_rounds_up_to_two_hours_and_is_urgent() {
        let now = Utc::now();
        let hours = hours_until_pickup(now + Duration::minutes(90), now);
        assert_eq!(hours, 2);
        assert!(is_urgent(hours, 2));
    }

    #[test]
    fn one_hundred_fifty_minutes_is_not_urgent() {
        let now = Utc::now();
        let hours = hours_until_pickup(now + Duration::minutes(150), now);
        assert_eq!(hours, 3);
        assert!(!is_urgent(hours, 2));
    }

    #[test]
    fn past_or_imminent_pickups_are_not_urgent() {
        let now = Utc::now();
        assert_eq!(hours_until_pickup(now + Duration::minutes(20), now), 0);
        assert!(!is_urgent(0, 2));
        assert!(!is_urgent(hours_until_pickup(now - Duration::hours(3), now), 2));
    }

    #[test]
    fn filters_parse_wire_names() {
        let filters: OrderFilters = serde_json::from_value(serde_json::json!({
            "scope": "mine",
            "status": "in_progress",
            "sort_by": "price",
            "order": "asc",
        }))
        .unwrap();

        assert_eq!(filters.scope, Some(DriverScope::Mine));
        assert_eq!(filters.status, Some(OrderStatus::InProgress));
        assert_eq!(filters.sort_by, Some(SortField::Price));
        assert_eq!(filters.order, Some(SortDirection::Asc));
        assert!(filters.search.is_none());
    }
}
