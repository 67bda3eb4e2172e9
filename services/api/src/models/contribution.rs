//! Contribution models
//!
//! Contributions are append-only: submitted once, never updated or deleted
//! through the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when a contributor has no usable profile
pub const UNKNOWN_MEMBER: &str = "Unknown Member";

/// Enumerated contribution types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionType {
    Tithe,
    Offering,
    Sacrifice,
}

impl ContributionType {
    /// The value as stored in the `contribution_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::Tithe => "tithe",
            ContributionType::Offering => "offering",
            ContributionType::Sacrifice => "sacrifice",
        }
    }

    /// Parse a stored value; anything outside the enumerated set yields `None`
    pub fn parse(value: &str) -> Option<ContributionType> {
        match value {
            "tithe" => Some(ContributionType::Tithe),
            "offering" => Some(ContributionType::Offering),
            "sacrifice" => Some(ContributionType::Sacrifice),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContributionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contribution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub contribution_type: ContributionType,
    pub created_at: DateTime<Utc>,
}

/// Contribution joined with the submitting member's display name, as shown
/// on the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberContribution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub contribution_type: ContributionType,
    pub created_at: DateTime<Utc>,
    pub member_name: String,
}

/// Request to submit a contribution; the type defaults to a tithe
#[derive(Debug, Clone, Deserialize)]
pub struct NewContributionRequest {
    pub amount: f64,
    pub contribution_type: Option<ContributionType>,
}

/// Validate a submitted amount. Runs before any write is attempted; a
/// rejected amount never reaches the database.
pub fn validate_amount(amount: f64) -> Result<(), String> {
    if !amount.is_finite() {
        return Err("Please enter a valid positive amount.".to_string());
    }

    if amount <= 0.0 {
        return Err("Please enter a valid positive amount.".to_string());
    }

    Ok(())
}

/// Compose the member display name from profile name parts
pub fn member_display_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    let name = format!(
        "{} {}",
        first_name.unwrap_or(""),
        last_name.unwrap_or("")
    );
    let name = name.trim();
    if name.is_empty() {
        UNKNOWN_MEMBER.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_finite_amounts_pass() {
        assert!(validate_amount(50.0).is_ok());
        assert!(validate_amount(0.01).is_ok());
        assert!(validate_amount(1_000_000.0).is_ok());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(validate_amount(-5.0).is_err());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-0.0).is_err());
    }

    #[test]
    fn non_finite_amounts_are_rejected() {
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_amount(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn contribution_type_round_trips() {
        for ty in [
            ContributionType::Tithe,
            ContributionType::Offering,
            ContributionType::Sacrifice,
        ] {
            assert_eq!(ContributionType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ContributionType::parse("donation"), None);
        assert_eq!(ContributionType::parse(""), None);
    }

    #[test]
    fn contribution_type_serde_is_lowercase() {
        let json = serde_json::to_string(&ContributionType::Offering).unwrap();
        assert_eq!(json, "\"offering\"");
        let parsed: ContributionType = serde_json::from_str("\"sacrifice\"").unwrap();
        assert_eq!(parsed, ContributionType::Sacrifice);
    }

    #[test]
    fn member_name_falls_back_when_profile_is_empty() {
        assert_eq!(member_display_name(Some("Amina"), Some("Odhiambo")), "Amina Odhiambo");
        assert_eq!(member_display_name(Some("Amina"), None), "Amina");
        assert_eq!(member_display_name(None, None), UNKNOWN_MEMBER);
        assert_eq!(member_display_name(Some(""), Some(" ")), UNKNOWN_MEMBER);
    }
}
