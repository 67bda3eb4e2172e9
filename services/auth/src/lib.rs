//! Identity service for the Offertory giving platform
//!
//! Owns accounts, credentials, and sessions: sign-up, sign-in, sign-out,
//! refresh-token rotation, and password reset. Issues RS256 access tokens
//! carrying the member's role set; the application service verifies them
//! with the public key only.

pub mod error;
pub mod jwt;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod validation;

use common::cache::RedisPool;

use crate::{
    jwt::JwtService,
    rate_limiter::RateLimiter,
    repositories::{ProfileRepository, RoleRepository, UserRepository},
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub session_manager: SessionManager,
    pub users: UserRepository,
    pub profiles: ProfileRepository,
    pub roles: RoleRepository,
    pub rate_limiter: RateLimiter,
}
