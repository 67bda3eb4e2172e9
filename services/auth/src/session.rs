//! Refresh-session store
//!
//! One refresh session per user, held in Redis under `session:{user_id}`
//! with a TTL equal to the refresh-token lifetime. A session is created on
//! sign-in and destroyed on sign-out; expiry is handled by Redis.

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::jwt::JwtService;
use common::cache::RedisPool;

/// Session manager over the Redis store
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
    jwt_service: JwtService,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(redis_pool: RedisPool, jwt_service: JwtService) -> Self {
        Self {
            redis_pool,
            jwt_service,
        }
    }

    fn session_key(user_id: Uuid) -> String {
        format!("session:{}", user_id)
    }

    /// Create or replace the session for a user
    pub async fn create_session(&self, user_id: Uuid, refresh_token: &str) -> Result<()> {
        info!("Creating session for user: {}", user_id);

        self.redis_pool
            .set(
                &Self::session_key(user_id),
                refresh_token,
                Some(self.jwt_service.refresh_token_expiry()),
            )
            .await?;

        Ok(())
    }

    /// Get the stored refresh token for a user
    pub async fn get_session(&self, user_id: Uuid) -> Result<Option<String>> {
        let refresh_token = self.redis_pool.get(&Self::session_key(user_id)).await?;
        Ok(refresh_token)
    }

    /// Delete the session for a user
    pub async fn delete_session(&self, user_id: Uuid) -> Result<()> {
        info!("Deleting session for user: {}", user_id);

        self.redis_pool.delete(&Self::session_key(user_id)).await?;
        Ok(())
    }

    /// Check that `refresh_token` matches the stored session
    pub async fn is_session_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool> {
        let stored_token = self.get_session(user_id).await?;

        match stored_token {
            Some(token) => Ok(token == refresh_token),
            None => Ok(false),
        }
    }
}
