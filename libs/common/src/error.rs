//! Infrastructure error types shared by the workspace
//!
//! Business outcomes never travel through these types; they only describe
//! failures to reach or prepare the backing database.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Error raised while connecting to, or preparing the database
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
