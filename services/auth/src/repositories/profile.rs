//! Profile repository
//!
//! The identity service only creates profiles (implicitly, at sign-up);
//! edits go through the application service.

use anyhow::Result;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::{NewProfile, Profile};

/// Profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the profile row for a freshly registered user
    pub async fn create(&self, new_profile: &NewProfile) -> Result<Profile> {
        info!("Creating profile for user: {}", new_profile.id);

        let row = sqlx::query(
            r#"
            INSERT INTO profiles (id, first_name, last_name)
            VALUES ($1, $2, $3)
            RETURNING id, first_name, last_name, created_at, updated_at
            "#,
        )
        .bind(new_profile.id)
        .bind(&new_profile.first_name)
        .bind(&new_profile.last_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Profile {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
