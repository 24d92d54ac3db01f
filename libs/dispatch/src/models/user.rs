//! User model: customers and drivers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Marketplace role, fixed when the user is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Driver,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "driver" => Ok(Role::Driver),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Vehicle descriptor published to customers once an order is claimed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub plate: String,
    #[serde(default = "Vehicle::default_capacity")]
    pub capacity: i32,
}

impl Vehicle {
    fn default_capacity() -> i32 {
        4
    }
}

/// Driver-only part of a user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub license_number: Option<String>,
    pub vehicle: Vehicle,
    pub rating: f64,
    /// Denormalized counter bumped on every successful claim
    pub total_trips: i64,
    pub is_available: bool,
}

impl DriverProfile {
    pub const DEFAULT_RATING: f64 = 5.0;

    pub fn new(vehicle: Vehicle, license_number: Option<String>) -> Self {
        Self {
            license_number,
            vehicle,
            rating: Self::DEFAULT_RATING,
            total_trips: 0,
            is_available: true,
        }
    }
}

/// User entity
///
/// `driver_profile` is only ever `Some` for [`Role::Driver`]. A driver may
/// exist without one until the vehicle details are filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub driver_profile: Option<DriverProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
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

/// Partial profile update. Role, rating, trip counter and availability are
/// not patchable here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    /// Creates the driver profile when the driver has none yet
    pub vehicle: Option<Vehicle>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.license_number.is_none()
            && self.vehicle.is_none()
    }

    /// Merge the patch into `user`, the reference semantics every store
    /// implementation follows.
    pub fn apply_to(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
        match (&mut user.driver_profile, &self.vehicle) {
            (Some(profile), Some(vehicle)) => profile.vehicle = vehicle.clone(),
            (None, Some(vehicle)) => {
                user.driver_profile = Some(DriverProfile::new(vehicle.clone(), None));
            }
            _ => {}
        }
        if let (Some(profile), Some(license)) = (&mut user.driver_profile, &self.license_number) {
            profile.license_number = Some(license.clone());
        }
        user.updated_at = now;
    }
}
