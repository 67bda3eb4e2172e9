//! Repositories for database operations

use anyhow::Result;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Profile, Role};

pub mod contribution;

pub use contribution::ContributionRepository;

fn profile_from_row(row: &sqlx::postgres::PgRow) -> Profile {
    Profile {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Profile repository for database operations
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a profile by the owning user's id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// Update the caller's own profile row
    pub async fn update(
        &self,
        id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
            UPDATE profiles
            SET first_name = $2, last_name = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, first_name, last_name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }
}

/// Role repository for database operations
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Create a new role repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the role set for a user. Unknown tags in the table are skipped
    /// with a warning rather than failing the read.
    pub async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT role
            FROM user_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let roles = rows
            .into_iter()
            .filter_map(|row| {
                let tag: String = row.get("role");
                let role = Role::parse(&tag);
                if role.is_none() {
                    warn!("Skipping unknown role tag {:?} for user {}", tag, user_id);
                }
                role
            })
            .collect();

        Ok(roles)
    }
}
