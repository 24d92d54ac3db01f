//! Order lifecycle and driver matching core for the airport transfer
//! marketplace.
//!
//! [`Marketplace`] is the entry point. It owns the shared [`store::Store`],
//! a [`clock::Clock`] and a [`pricing::PricingPolicy`] and exposes the six
//! operations the transport layer calls:
//!
//! - [`Marketplace::create_order`]
//! - [`Marketplace::accept_order`]
//! - [`Marketplace::update_order_status`]
//! - [`Marketplace::list_orders`]
//! - [`Marketplace::set_driver_availability`]
//! - [`Marketplace::driver_stats`]
//!
//! Every operation resolves the acting user from the store and re-checks its
//! role, so the caller's session claims are never trusted on their own.

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listing;
pub mod marketplace;
pub mod matching;
pub mod models;
pub mod pricing;
pub mod stats;
pub mod store;
pub mod validation;

pub use actor::Actor;
pub use config::DispatchConfig;
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use marketplace::Marketplace;
