//! Order lifecycle engine
//!
//! ```text
//!            claim            begin
//!  pending ───────► accepted ───────► in_progress
//!     │                │  │               │
//!     │ cancel         │  └── complete ───┤
//!     │                │ cancel           │ complete / cancel
//!     ▼                ▼                  ▼
//!  cancelled ◄──────────────────────  completed
//! ```
//!
//! `completed` and `cancelled` are terminal. Claims go through
//! [`crate::Marketplace::accept_order`]; only `in_progress`, `completed` and
//! `cancelled` can be requested through [`Marketplace::update_order_status`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    actor::{Actor, Session},
    error::{DispatchError, DispatchResult},
    marketplace::Marketplace,
    models::{Order, OrderDraft, OrderStatus},
    store::StatusChange,
    validation,
};

/// Events that move an order between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Claim,
    Begin,
    Complete,
    Cancel,
}

impl OrderEvent {
    /// Event behind an externally requested status; `pending` and
    /// `accepted` cannot be requested.
    pub fn requesting(status: OrderStatus) -> Option<OrderEvent> {
        match status {
            OrderStatus::InProgress => Some(OrderEvent::Begin),
            OrderStatus::Completed => Some(OrderEvent::Complete),
            OrderStatus::Cancelled => Some(OrderEvent::Cancel),
            OrderStatus::Pending | OrderStatus::Accepted => None,
        }
    }
}

/// Transition table
pub fn next_status(from: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
    use OrderStatus::*;

    match (from, event) {
        (Pending, OrderEvent::Claim) => Some(Accepted),
        (Accepted, OrderEvent::Begin) => Some(InProgress),
        (Accepted | InProgress, OrderEvent::Complete) => Some(Completed),
        (Pending | Accepted | InProgress, OrderEvent::Cancel) => Some(Cancelled),
        _ => None,
    }
}

/// Whether `to` may be requested externally while the order is in `from`
pub fn can_request(from: OrderStatus, to: OrderStatus) -> bool {
    OrderEvent::requesting(to).and_then(|event| next_status(from, event)) == Some(to)
}

/// Status change request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    /// Only accepted together with `completed`
    #[serde(default)]
    pub final_price: Option<i64>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            final_price: None,
        }
    }
}

impl Marketplace {
    /// Create a `pending` order for the calling customer
    pub async fn create_order(&self, session: &Session, draft: OrderDraft) -> DispatchResult<Order> {
        let (actor, customer) = self.resolve(session).await?;
        let customer_id = match actor {
            Actor::Customer(id) => id,
            Actor::Driver(_) => {
                return Err(DispatchError::Forbidden(
                    "only customers can create orders".to_string(),
                ));
            }
        };

        let pick = |value: &Option<String>, fallback: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .trim()
                .to_string()
        };
        let customer_name = pick(&draft.customer_name, &customer.name);
        let customer_phone = pick(&draft.customer_phone, &customer.phone);
        let customer_email = pick(&draft.customer_email, &customer.email);

        let now = self.now();
        validation::validate_order_draft(
            &draft,
            (&customer_name, &customer_phone, &customer_email),
            now,
            &self.config,
        )
        .map_err(DispatchError::Validation)?;

        let pickup = draft.pickup.into_location();
        let destination = draft.destination.into_location();
        let estimated_price = self
            .pricing
            .estimate(&pickup, &destination, draft.passenger_count);

        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            driver_id: None,
            customer_name,
            customer_phone,
            customer_email,
            pickup,
            destination,
            pickup_at: draft.pickup_at,
            flight_number: optional(draft.flight_number),
            airline: optional(draft.airline),
            passenger_count: draft.passenger_count,
            luggage_count: draft.luggage_count.unwrap_or(0),
            special_requirements: optional(draft.special_requirements),
            notes: optional(draft.notes),
            status: OrderStatus::Pending,
            estimated_price,
            final_price: None,
            created_at: now,
            updated_at: now,
            accepted_at: None,
            completed_at: None,
        };

        let order = self.store.insert_order(order).await?;
        info!(
            order_id = %order.id,
            %customer_id,
            estimated_price = order.estimated_price,
            "Order created"
        );
        Ok(order)
    }

    /// Move an order to `in_progress`, `completed` or `cancelled`.
    ///
    /// Only the owning customer or the assigned driver may do so. Cancel
    /// keeps `driver_id` on the order as an audit trail.
    pub async fn update_order_status(
        &self,
        session: &Session,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> DispatchResult<Order> {
        let (actor, _) = self.resolve(session).await?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(DispatchError::order_not_found(order_id))?;

        let authorized = match actor {
            Actor::Customer(id) => order.customer_id == id,
            Actor::Driver(id) => order.driver_id == Some(id),
        };
        if !authorized {
            return Err(DispatchError::Forbidden(
                "only the customer or the assigned driver may change this order".to_string(),
            ));
        }

        let invalid = |from| DispatchError::InvalidTransition {
            from,
            to: update.status,
        };
        if !can_request(order.status, update.status) {
            return Err(invalid(order.status));
        }

        if let Some(price) = update.final_price {
            if update.status != OrderStatus::Completed {
                return Err(DispatchError::Validation(
                    "final price can only be set when completing an order".to_string(),
                ));
            }
            if price < 0 {
                return Err(DispatchError::Validation(
                    "final price must not be negative".to_string(),
                ));
            }
        }

        let change = StatusChange {
            to: update.status,
            at: self.now(),
            final_price: update.final_price,
        };

        match self.store.transition_order(order_id, order.status, change).await? {
            Some(updated) => {
                info!(
                    %order_id,
                    from = %order.status,
                    to = %updated.status,
                    actor = %actor.id(),
                    "Order status updated"
                );
                Ok(updated)
            }
            None => {
                // Someone else moved the order between our read and write.
                let current = self
                    .store
                    .get_order(order_id)
                    .await?
                    .ok_or(DispatchError::order_not_found(order_id))?;
                debug!(%order_id, expected = %order.status, found = %current.status, "status write lost a race");

                if can_request(current.status, update.status) {
                    Err(DispatchError::Conflict(
                        "order was modified concurrently, reload and retry".to_string(),
                    ))
                } else {
                    Err(invalid(current.status))
                }
            }
        }
    }
}
