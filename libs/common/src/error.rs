//! Database error taxonomy shared by both services

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Errors raised by database setup and queries
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while establishing a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred while executing a query
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
