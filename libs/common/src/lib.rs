//! Common library for the airport transfer marketplace
//!
//! This crate provides the infrastructure shared by the dispatch core and the
//! HTTP service: PostgreSQL connectivity and migrations, infrastructure error
//! types and tracing bootstrap.

pub mod database;
pub mod error;
pub mod telemetry;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     run_migrations(&pool).await?;
///     println!("Database health check: {}", health_check(&pool).await);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
