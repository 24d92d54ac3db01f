//! Driver matching: the atomic claim and the availability toggle

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    actor::{Actor, Session},
    error::{DispatchError, DispatchResult},
    listing::EnrichedOrder,
    marketplace::Marketplace,
    models::{DriverProfile, OrderStatus},
    store::{AvailabilityOutcome, ClaimOutcome, StoreError},
};

pub const ALREADY_ACCEPTED: &str = "order already accepted by another driver";
pub const DRIVER_BUSY: &str = "driver already has an active order";

impl Marketplace {
    /// Claim a pending order for the calling driver.
    ///
    /// Losing the race to another driver is an ordinary `Conflict`; the
    /// caller decides whether to try a different order.
    pub async fn accept_order(&self, session: &Session, order_id: Uuid) -> DispatchResult<EnrichedOrder> {
        let (actor, driver) = self.resolve(session).await?;
        let driver_id = match actor {
            Actor::Driver(id) => id,
            Actor::Customer(_) => {
                return Err(DispatchError::Forbidden(
                    "only drivers can accept orders".to_string(),
                ));
            }
        };

        if self.store.count_active_orders(driver_id).await? > 0 {
            return Err(DispatchError::Conflict(DRIVER_BUSY.to_string()));
        }

        match &driver.driver_profile {
            None => {
                return Err(DispatchError::PreconditionFailed(
                    "driver profile is incomplete".to_string(),
                ));
            }
            Some(profile) if !profile.is_available => {
                return Err(DispatchError::PreconditionFailed(
                    "driver is marked unavailable".to_string(),
                ));
            }
            Some(_) => {}
        }

        match self.claim_with_retry(order_id, driver_id).await? {
            ClaimOutcome::Claimed(order) => {
                info!(%order_id, %driver_id, "Order accepted");

                // Denormalized counter; a failure here must not undo the claim.
                if let Err(e) = self.store.increment_total_trips(driver_id).await {
                    warn!(%driver_id, "Failed to increment total trips: {}", e);
                }

                let mut enriched = self.enrich(vec![order]).await?;
                enriched
                    .pop()
                    .ok_or(DispatchError::order_not_found(order_id))
            }
            ClaimOutcome::Taken(OrderStatus::Cancelled) => {
                debug!(%order_id, %driver_id, "claim on cancelled order");
                Err(DispatchError::Conflict(
                    "order was cancelled and is no longer available".to_string(),
                ))
            }
            ClaimOutcome::Taken(status) => {
                info!(%order_id, %driver_id, %status, "Claim lost to another driver");
                Err(DispatchError::Conflict(ALREADY_ACCEPTED.to_string()))
            }
            ClaimOutcome::DriverBusy => Err(DispatchError::Conflict(DRIVER_BUSY.to_string())),
            ClaimOutcome::DriverUnavailable => {
                debug!(%order_id, %driver_id, "driver went unavailable before the claim landed");
                Err(DispatchError::PreconditionFailed(
                    "driver is marked unavailable".to_string(),
                ))
            }
            ClaimOutcome::Missing => Err(DispatchError::order_not_found(order_id)),
        }
    }

    /// Run the store claim, retrying only on transient write contention
    async fn claim_with_retry(&self, order_id: Uuid, driver_id: Uuid) -> DispatchResult<ClaimOutcome> {
        let mut attempt = 0;
        loop {
            match self.store.claim_order(order_id, driver_id, self.now()).await {
                Err(StoreError::Transient(reason)) if attempt < self.config.claim_retry_attempts => {
                    attempt += 1;
                    debug!(%order_id, attempt, %reason, "retrying claim after store contention");
                }
                result => return Ok(result?),
            }
        }
    }

    /// Toggle the calling driver's availability. Going offline is refused
    /// while an accepted or in-progress order is held.
    pub async fn set_driver_availability(
        &self,
        session: &Session,
        is_available: bool,
    ) -> DispatchResult<DriverProfile> {
        let (actor, _) = self.resolve(session).await?;
        let driver_id = match actor {
            Actor::Driver(id) => id,
            Actor::Customer(_) => {
                return Err(DispatchError::Forbidden(
                    "only drivers have an availability".to_string(),
                ));
            }
        };

        match self
            .store
            .set_availability(driver_id, is_available, self.now())
            .await?
        {
            AvailabilityOutcome::Updated(user) => {
                info!(%driver_id, is_available, "Driver availability updated");
                user.driver_profile.ok_or_else(|| {
                    DispatchError::PreconditionFailed("driver profile is incomplete".to_string())
                })
            }
            AvailabilityOutcome::HasActiveOrders => Err(DispatchError::Conflict(
                "driver has active orders".to_string(),
            )),
            AvailabilityOutcome::NoDriverProfile => Err(DispatchError::PreconditionFailed(
                "driver profile is incomplete".to_string(),
            )),
        }
    }
}
