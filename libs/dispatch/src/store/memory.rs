//! In-process store
//!
//! All state sits behind one async mutex, so every call (the conditional
//! claim and availability writes included) observes and mutates a consistent
//! snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AvailabilityOutcome, ClaimOutcome, OrderQuery, OrderSort, OrderStore, SortDirection,
    SortField, StatusChange, StoreError, StoreResult, UserStore,
};
use crate::models::{Order, OrderStatus, User, UserPatch};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    orders: HashMap<Uuid, Order>,
}

impl Tables {
    fn has_active_order(&self, driver_id: Uuid) -> bool {
        self.orders
            .values()
            .any(|order| order.driver_id == Some(driver_id) && order.status.is_active())
    }
}

/// Store backed by in-memory maps
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &Order, b: &Order, sort: OrderSort) -> Ordering {
    let primary = match sort.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::PickupAt => a.pickup_at.cmp(&b.pickup_at),
        SortField::Price => a.effective_price().cmp(&b.effective_price()),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    };
    let primary = match sort.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;

        let email = user.email.to_lowercase();
        if tables.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(StoreError::DuplicateKey(format!("email {}", user.email)));
        }
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey(format!("user id {}", user.id)));
        }

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch, at: DateTime<Utc>) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "user", id })?;

        patch.apply_to(user, at);
        Ok(user.clone())
    }

    async fn increment_total_trips(&self, driver_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let profile = tables
            .users
            .get_mut(&driver_id)
            .and_then(|user| user.driver_profile.as_mut())
            .ok_or(StoreError::NotFound {
                entity: "driver profile",
                id: driver_id,
            })?;

        profile.total_trips += 1;
        Ok(())
    }

    async fn set_availability(
        &self,
        driver_id: Uuid,
        is_available: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<AvailabilityOutcome> {
        let mut tables = self.tables.lock().await;

        if !is_available && tables.has_active_order(driver_id) {
            return Ok(AvailabilityOutcome::HasActiveOrders);
        }

        let user = tables.users.get_mut(&driver_id).ok_or(StoreError::NotFound {
            entity: "user",
            id: driver_id,
        })?;
        let Some(profile) = user.driver_profile.as_mut() else {
            return Ok(AvailabilityOutcome::NoDriverProfile);
        };

        profile.is_available = is_available;
        user.updated_at = at;
        Ok(AvailabilityOutcome::Updated(user.clone()))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: Order) -> StoreResult<Order> {
        let mut tables = self.tables.lock().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateKey(format!("order id {}", order.id)));
        }
        if order.status.requires_driver() && order.driver_id.is_none() {
            return Err(StoreError::Corrupt(format!(
                "order {} is {} without a driver",
                order.id, order.status
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn claim_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut tables = self.tables.lock().await;

        match tables.orders.get(&order_id) {
            None => return Ok(ClaimOutcome::Missing),
            Some(order) if order.status != OrderStatus::Pending || order.driver_id.is_some() => {
                return Ok(ClaimOutcome::Taken(order.status));
            }
            Some(_) => {}
        }
        if tables.has_active_order(driver_id) {
            return Ok(ClaimOutcome::DriverBusy);
        }
        let available = tables
            .users
            .get(&driver_id)
            .and_then(|user| user.driver_profile.as_ref())
            .is_some_and(|profile| profile.is_available);
        if !available {
            return Ok(ClaimOutcome::DriverUnavailable);
        }

        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Ok(ClaimOutcome::Missing);
        };
        order.driver_id = Some(driver_id);
        order.status = OrderStatus::Accepted;
        order.accepted_at = Some(at);
        order.updated_at = at;
        Ok(ClaimOutcome::Claimed(order.clone()))
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> StoreResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.status == expected => {
                change.apply_to(order);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| query.customer_id.is_none_or(|id| o.customer_id == id))
            .filter(|o| query.driver_id.is_none_or(|id| o.driver_id == Some(id)))
            .filter(|o| query.status.is_none_or(|status| o.status == status))
            .filter(|o| !query.unclaimed || o.driver_id.is_none())
            .filter(|o| search.is_none_or(|needle| o.matches_search(needle)))
            .cloned()
            .collect();

        orders.sort_by(|a, b| compare(a, b, query.sort));
        if let Some(limit) = query.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    async fn count_active_orders(&self, driver_id: Uuid) -> StoreResult<u64> {
        let tables = self.tables.lock().await;
        let count = tables
            .orders
            .values()
            .filter(|o| o.driver_id == Some(driver_id) && o.status.is_active())
            .count();
        Ok(count as u64)
    }
}
