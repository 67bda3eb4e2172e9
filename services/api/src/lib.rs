//! Application service for the Offertory giving platform
//!
//! Members submit contributions, read their own history, and edit their
//! profile; admins get the aggregated contributions dashboard. Every
//! authenticated request re-derives the caller's `{user, profile, roles}`
//! snapshot from the store; the role set inside the access token is never
//! trusted for authorization.

pub mod context;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
