//! API models for request and response payloads
//!
//! Order payloads are the marketplace types themselves (`OrderDraft`,
//! `StatusUpdate`, `OrderFilters`, `EnrichedOrder`, `DriverStats`); only the
//! user surface has its own shapes.

use chrono::{DateTime, Utc};
use dispatch::models::{DriverProfile, NewUser, Role, User, Vehicle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for creating a user record. Credentials stay with the issuer.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            email: req.email,
            name: req.name,
            phone: req.phone,
            role: req.role,
            license_number: req.license_number,
            vehicle: req.vehicle,
        }
    }
}

/// Response for user operations
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_profile: Option<DriverProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            role: user.role,
            driver_profile: user.driver_profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Body of `PUT /drivers/me/availability`
#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}
