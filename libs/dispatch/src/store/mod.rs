//! Entity store for users and orders
//!
//! Every method is atomic per call. The two conditional writes the core
//! depends on, [`OrderStore::claim_order`] and
//! [`UserStore::set_availability`], evaluate their guard inside the same
//! write; callers must never emulate them with a read followed by a write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, User, UserPatch};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store-level failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint (e.g. user email) was violated
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Write contention the caller may retry once (serialization failure,
    /// deadlock)
    #[error("transient store contention: {0}")]
    Transient(String),

    /// A persisted row could not be mapped back to the domain model
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of the atomic claim
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The order moved to `accepted` with the driver assigned
    Claimed(Order),
    /// The order was no longer pending and unassigned; carries the status
    /// observed after the failed write
    Taken(OrderStatus),
    /// The driver already holds an active order
    DriverBusy,
    /// The driver has no profile or is marked unavailable at write time
    DriverUnavailable,
    Missing,
}

/// Result of the conditional availability toggle
#[derive(Debug, Clone, PartialEq)]
pub enum AvailabilityOutcome {
    Updated(User),
    HasActiveOrders,
    NoDriverProfile,
}

/// Status write applied by [`OrderStore::transition_order`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    pub final_price: Option<i64>,
}

impl StatusChange {
    /// Apply to an in-memory record; `completed_at` is stamped only when
    /// entering `completed`.
    pub fn apply_to(&self, order: &mut Order) {
        order.status = self.to;
        order.updated_at = self.at;
        if self.to == OrderStatus::Completed {
            order.completed_at = Some(self.at);
            if let Some(price) = self.final_price {
                order.final_price = Some(price);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    #[serde(alias = "pickup_date_time")]
    PickupAt,
    /// `final_price` when set, otherwise `estimated_price`
    Price,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl OrderSort {
    pub const NEWEST_FIRST: OrderSort = OrderSort {
        field: SortField::CreatedAt,
        direction: SortDirection::Desc,
    };

    pub const SOONEST_PICKUP_FIRST: OrderSort = OrderSort {
        field: SortField::PickupAt,
        direction: SortDirection::Asc,
    };
}

impl Default for OrderSort {
    fn default() -> Self {
        Self::NEWEST_FIRST
    }
}

/// Order filter; all set criteria must hold
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub customer_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    /// Only orders without a driver
    pub unclaimed: bool,
    /// Case-insensitive match on contact, address, flight and id fields
    pub search: Option<String>,
    pub sort: OrderSort,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateKey`] when the email is taken
    async fn create_user(&self, user: User) -> StoreResult<User>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Batched lookup for read-time joins; unknown ids are skipped
    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    /// Partial merge; fails with [`StoreError::NotFound`] when absent
    async fn update_user(&self, id: Uuid, patch: UserPatch, at: DateTime<Utc>) -> StoreResult<User>;

    /// Store-level `total_trips += 1`
    async fn increment_total_trips(&self, driver_id: Uuid) -> StoreResult<()>;

    /// Set `is_available`; setting `false` is refused while the driver
    /// owns an active order.
    async fn set_availability(
        &self,
        driver_id: Uuid,
        is_available: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<AvailabilityOutcome>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> StoreResult<Order>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Atomic compare-and-set: succeeds only while the order is `pending`
    /// with no driver, the driver holds no active order and is available.
    async fn claim_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome>;

    /// Compare-and-set on the current status. `None` means the order was
    /// not in `expected` at write time (or does not exist).
    async fn transition_order(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> StoreResult<Option<Order>>;

    async fn find_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;

    async fn count_active_orders(&self, driver_id: Uuid) -> StoreResult<u64>;
}

/// Combined store handed to the core
pub trait Store: UserStore + OrderStore {}

impl<T: UserStore + OrderStore> Store for T {}
