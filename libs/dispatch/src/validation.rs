//! Input validation for user and order payloads

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::{
    config::DispatchConfig,
    models::{NewUser, OrderDraft, Role, Vehicle},
};

/// Validate a required free-text field
pub fn validate_required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate phone: digits with optional leading `+`, spaces, dashes, parentheses
pub fn validate_phone(phone: &str) -> Result<(), String> {
    validate_required("Phone", phone)?;

    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,24}$").expect("Failed to compile phone regex"));

    if !regex.is_match(phone.trim()) {
        return Err("Invalid phone format".to_string());
    }

    Ok(())
}

/// Validate vehicle details of a driver profile
pub fn validate_vehicle(vehicle: &Vehicle) -> Result<(), String> {
    validate_required("Vehicle make", &vehicle.make)?;
    validate_required("Vehicle model", &vehicle.model)?;
    validate_required("Vehicle plate", &vehicle.plate)?;

    if !(1..=16).contains(&vehicle.capacity) {
        return Err("Vehicle capacity must be between 1 and 16".to_string());
    }
    if !(1950..=2100).contains(&vehicle.year) {
        return Err("Vehicle year is out of range".to_string());
    }

    Ok(())
}

/// Validate a user creation payload, including the rule that only drivers
/// carry vehicle details.
pub fn validate_new_user(user: &NewUser) -> Result<(), String> {
    validate_email(user.email.trim())?;
    validate_required("Name", &user.name)?;
    if !user.phone.trim().is_empty() {
        validate_phone(&user.phone)?;
    }

    match (user.role, &user.vehicle) {
        (Role::Customer, Some(_)) => Err("Only drivers can register a vehicle".to_string()),
        (Role::Customer, None) if user.license_number.is_some() => {
            Err("Only drivers can register a license number".to_string())
        }
        (Role::Driver, Some(vehicle)) => validate_vehicle(vehicle),
        _ => Ok(()),
    }
}

/// Validate an order draft once contact fallbacks have been resolved
pub fn validate_order_draft(
    draft: &OrderDraft,
    contact: (&str, &str, &str),
    now: DateTime<Utc>,
    config: &DispatchConfig,
) -> Result<(), String> {
    let (name, phone, email) = contact;
    validate_required("Customer name", name)?;
    validate_phone(phone)?;
    validate_email(email.trim())?;

    validate_required("Pickup address", &draft.pickup.address)?;
    validate_required("Destination address", &draft.destination.address)?;

    if draft.pickup_at <= now {
        return Err("Pickup time must be in the future".to_string());
    }

    if !(1..=config.max_passengers).contains(&draft.passenger_count) {
        return Err(format!(
            "Passenger count must be between 1 and {}",
            config.max_passengers
        ));
    }

    let luggage = draft.luggage_count.unwrap_or(0);
    if !(0..=config.max_luggage).contains(&luggage) {
        return Err(format!(
            "Luggage count must be between 0 and {}",
            config.max_luggage
        ));
    }

    Ok(())
}
