//! Domain records held by the entity store

pub mod order;
pub mod user;

// Re-export for convenience
pub use order::{Location, LocationDraft, Order, OrderDraft, OrderStatus};
pub use user::{DriverProfile, NewUser, Role, User, UserPatch, Vehicle};
