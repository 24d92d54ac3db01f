//! Application state shared across handlers

use dispatch::Marketplace;
use sqlx::PgPool;

use crate::middleware::JwtVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub marketplace: Marketplace,
    pub jwt: JwtVerifier,
}
