//! Contribution repository for database operations

use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::contribution::{
    Contribution, ContributionType, MemberContribution, member_display_name,
};

/// Cap on a history read, matching the hosted store's default result size
const DEFAULT_RESULT_LIMIT: i64 = 1000;

fn contribution_type_from_row(row: &sqlx::postgres::PgRow) -> Result<ContributionType> {
    let stored: String = row.get("contribution_type");
    ContributionType::parse(&stored)
        .ok_or_else(|| anyhow::anyhow!("Unknown contribution type in store: {:?}", stored))
}

/// Contribution repository
#[derive(Clone)]
pub struct ContributionRepository {
    pool: PgPool,
}

impl ContributionRepository {
    /// Create a new contribution repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a contribution for a user
    pub async fn create(
        &self,
        user_id: Uuid,
        amount: f64,
        contribution_type: ContributionType,
    ) -> Result<Contribution> {
        let row = sqlx::query(
            r#"
            INSERT INTO contributions (user_id, amount, contribution_type)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, amount, contribution_type, created_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(contribution_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Contribution {
            id: row.get("id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            contribution_type: contribution_type_from_row(&row)?,
            created_at: row.get("created_at"),
        })
    }

    /// The caller's own records, newest first
    pub async fn history_for_user(&self, user_id: Uuid) -> Result<Vec<Contribution>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, contribution_type, created_at
            FROM contributions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(DEFAULT_RESULT_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Contribution {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    amount: row.get("amount"),
                    contribution_type: contribution_type_from_row(&row)?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    /// All contributions joined with the submitting members' profiles,
    /// newest first, for the admin dashboard
    pub async fn all_with_members(&self) -> Result<Vec<MemberContribution>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.user_id, c.amount, c.contribution_type, c.created_at,
                   p.first_name, p.last_name
            FROM contributions c
            LEFT JOIN profiles p ON p.id = c.user_id
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let first_name: Option<String> = row.get("first_name");
                let last_name: Option<String> = row.get("last_name");

                Ok(MemberContribution {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    amount: row.get("amount"),
                    contribution_type: contribution_type_from_row(&row)?,
                    created_at: row.get("created_at"),
                    member_name: member_display_name(first_name.as_deref(), last_name.as_deref()),
                })
            })
            .collect()
    }
}
