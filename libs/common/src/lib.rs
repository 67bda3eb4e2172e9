//! Shared infrastructure for the Offertory giving platform
//!
//! Both services pull their plumbing from here: PostgreSQL connection
//! pooling, the Redis pool used for refresh sessions and short-lived tokens,
//! and the database error taxonomy.

pub mod cache;
pub mod database;
pub mod error;
