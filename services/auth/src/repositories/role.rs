//! Role repository
//!
//! Reads the `user_roles` mapping. Unknown tags in the table are skipped
//! with a warning rather than failing the whole read.

use anyhow::Result;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::models::Role;

/// Role repository
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Create a new role repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the role set for a user
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
