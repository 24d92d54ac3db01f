//! Service facade shared by the lifecycle, matching, listing and stats
//! operations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    actor::{Actor, Session},
    clock::{Clock, SystemClock},
    config::DispatchConfig,
    error::{DispatchError, DispatchResult},
    models::{DriverProfile, NewUser, Role, User, UserPatch},
    pricing::{PricingPolicy, ReferencePricing},
    store::Store,
    validation,
};

/// Handle to the dispatch core. Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct Marketplace {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pricing: Arc<dyn PricingPolicy>,
    pub(crate) config: Arc<DispatchConfig>,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        pricing: Arc<dyn PricingPolicy>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            clock,
            pricing,
            config: Arc::new(config),
        }
    }

    /// Wall clock and the reference pricing policy from `config.pricing`
    pub fn with_defaults(store: Arc<dyn Store>, config: DispatchConfig) -> Self {
        let pricing = Arc::new(ReferencePricing::new(config.pricing.clone()));
        Self::new(store, Arc::new(SystemClock), pricing, config)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Load the session's user and check the claimed role against the
    /// stored one.
    pub(crate) async fn resolve(&self, session: &Session) -> DispatchResult<(Actor, User)> {
        let user = self
            .store
            .get_user(session.user_id)
            .await?
            .ok_or_else(|| DispatchError::Forbidden(format!("unknown user {}", session.user_id)))?;

        if user.role != session.role {
            warn!(
                user_id = %user.id,
                claimed = %session.role,
                stored = %user.role,
                "session role does not match stored role"
            );
            return Err(DispatchError::Forbidden(
                "session role does not match account".to_string(),
            ));
        }

        Ok((Actor::of(&user), user))
    }

    /// Register a user record. Credentials live with the external issuer.
    pub async fn create_user(&self, new_user: NewUser) -> DispatchResult<User> {
        validation::validate_new_user(&new_user).map_err(DispatchError::Validation)?;

        let now = self.now();
        let driver_profile = match new_user.role {
            Role::Driver => new_user
                .vehicle
                .map(|vehicle| DriverProfile::new(vehicle, new_user.license_number)),
            Role::Customer => None,
        };

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.trim().to_string(),
            name: new_user.name.trim().to_string(),
            phone: new_user.phone.trim().to_string(),
            role: new_user.role,
            driver_profile,
            created_at: now,
            updated_at: now,
        };

        let user = self.store.create_user(user).await?;
        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> DispatchResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or(DispatchError::user_not_found(id))
    }

    /// Patch the caller's own profile. Drivers complete a missing driver
    /// profile by supplying a vehicle.
    pub async fn update_profile(&self, session: &Session, patch: UserPatch) -> DispatchResult<User> {
        let (actor, _) = self.resolve(session).await?;

        if patch.is_empty() {
            return Err(DispatchError::Validation("Nothing to update".to_string()));
        }
        if let Some(name) = &patch.name {
            validation::validate_required("Name", name).map_err(DispatchError::Validation)?;
        }
        if let Some(phone) = &patch.phone {
            validation::validate_phone(phone).map_err(DispatchError::Validation)?;
        }

        match actor {
            Actor::Customer(_) if patch.vehicle.is_some() || patch.license_number.is_some() => {
                return Err(DispatchError::Validation(
                    "Only drivers carry vehicle details".to_string(),
                ));
            }
            Actor::Customer(_) => {}
            Actor::Driver(_) => {
                if let Some(vehicle) = &patch.vehicle {
                    validation::validate_vehicle(vehicle).map_err(DispatchError::Validation)?;
                }
            }
        }

        let user = self.store.update_user(actor.id(), patch, self.now()).await?;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}
