//! Member profile model
//!
//! A profile row is keyed 1:1 by the user id and is created implicitly when
//! the account is registered. Names stay optional; members fill them in
//! later from the profile page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Profile entity, keyed by the owning user's id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for the implicit profile created at sign-up
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
