//! Admin dashboard filtering and aggregation
//!
//! The store hands us the joined rows; everything after that is a pure,
//! synchronous transform: three independent predicates over the rows, then
//! a count, a running total, and a distinct-member count over whatever
//! survived. Re-applying the same filter to the same rows always yields the
//! same result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::contribution::{ContributionType, MemberContribution};

/// Raw query parameters for the dashboard
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    /// Exact date, `YYYY-MM-DD`
    pub date: Option<String>,
    /// Exact contribution type
    pub contribution_type: Option<String>,
    /// Case-insensitive substring of the member display name
    pub member: Option<String>,
}

/// Parsed filter triple. Every component is independent; an absent
/// component matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributionFilter {
    pub date: Option<NaiveDate>,
    pub contribution_type: Option<ContributionType>,
    pub member: Option<String>,
}

impl ContributionFilter {
    /// Parse the raw query parameters. Empty strings count as absent, so a
    /// cleared filter control behaves like no filter at all.
    pub fn from_query(query: &DashboardQuery) -> Result<Self, String> {
        let date = match query.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| format!("Invalid date filter: {:?}", raw))?,
            ),
        };

        let contribution_type = match query.contribution_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                ContributionType::parse(raw)
                    .ok_or_else(|| format!("Invalid contribution type filter: {:?}", raw))?,
            ),
        };

        let member = match query.member.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.to_string()),
        };

        Ok(Self {
            date,
            contribution_type,
            member,
        })
    }

    /// Whether a row survives all three predicates
    pub fn matches(&self, row: &MemberContribution) -> bool {
        let matches_date = self
            .date
            .is_none_or(|date| row.created_at.date_naive() == date);

        let matches_type = self
            .contribution_type
            .is_none_or(|ty| row.contribution_type == ty);

        let matches_member = self.member.as_deref().is_none_or(|needle| {
            row.member_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });

        matches_date && matches_type && matches_member
    }
}

/// Apply a filter triple to the fetched rows
pub fn filter_contributions(
    rows: &[MemberContribution],
    filter: &ContributionFilter,
) -> Vec<MemberContribution> {
    rows.iter().filter(|row| filter.matches(row)).cloned().collect()
}

/// Aggregates over a filtered subset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// Number of contributions in the subset
    pub total_count: usize,
    /// Sum of amounts over the subset
    pub total_amount: f64,
    /// Distinct contributing members in the subset
    pub unique_members: usize,
}

/// Compute the dashboard aggregates for a set of rows
pub fn summarize(rows: &[MemberContribution]) -> DashboardSummary {
    let total_amount = rows.iter().map(|row| row.amount).sum();
    let unique_members = rows
        .iter()
        .map(|row| row.user_id)
        .collect::<HashSet<_>>()
        .len();

    DashboardSummary {
        total_count: rows.len(),
        total_amount,
        unique_members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn row(
        user_id: Uuid,
        amount: f64,
        ty: ContributionType,
        date: (i32, u32, u32),
        member_name: &str,
    ) -> MemberContribution {
        MemberContribution {
            id: Uuid::new_v4(),
            user_id,
            amount,
            contribution_type: ty,
            created_at: Utc
                .with_ymd_and_hms(date.0, date.1, date.2, 10, 30, 0)
                .unwrap(),
            member_name: member_name.to_string(),
        }
    }

    fn sample() -> (Uuid, Uuid, Vec<MemberContribution>) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let rows = vec![
            row(alice, 100.0, ContributionType::Tithe, (2024, 1, 1), "Alice Mwangi"),
            row(bob, 50.0, ContributionType::Offering, (2024, 1, 2), "Bob Otieno"),
        ];
        (alice, bob, rows)
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let (_, _, rows) = sample();

        let filtered = filter_contributions(&rows, &ContributionFilter::default());

        assert_eq!(filtered.len(), 2);
        let summary = summarize(&filtered);
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.total_amount, 150.0);
        assert_eq!(summary.unique_members, 2);
    }

    #[test]
    fn type_filter_narrows_total_and_count() {
        let (_, _, rows) = sample();
        let filter = ContributionFilter {
            contribution_type: Some(ContributionType::Tithe),
            ..Default::default()
        };

        let filtered = filter_contributions(&rows, &filter);
        let summary = summarize(&filtered);

        assert_eq!(summary.total_count, 1);
        assert_eq!(summary.total_amount, 100.0);
        assert_eq!(summary.unique_members, 1);
    }

    #[test]
    fn date_filter_matches_the_utc_date_exactly() {
        let (_, _, rows) = sample();
        let filter = ContributionFilter {
            date: NaiveDate::from_ymd_opt(2024, 1, 2),
            ..Default::default()
        };

        let filtered = filter_contributions(&rows, &filter);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].member_name, "Bob Otieno");
    }

    #[test]
    fn member_filter_is_a_case_insensitive_substring() {
        let (_, _, rows) = sample();
        let filter = ContributionFilter {
            member: Some("mWaNgI".to_string()),
            ..Default::default()
        };

        let filtered = filter_contributions(&rows, &filter);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].member_name, "Alice Mwangi");
    }

    #[test]
    fn predicates_compose_with_and() {
        let (alice, _, mut rows) = sample();
        rows.push(row(
            alice,
            25.0,
            ContributionType::Tithe,
            (2024, 1, 2),
            "Alice Mwangi",
        ));

        let filter = ContributionFilter {
            date: NaiveDate::from_ymd_opt(2024, 1, 2),
            contribution_type: Some(ContributionType::Tithe),
            member: Some("alice".to_string()),
        };

        let filtered = filter_contributions(&rows, &filter);
        let summary = summarize(&filtered);

        assert_eq!(summary.total_count, 1);
        assert_eq!(summary.total_amount, 25.0);
    }

    #[test]
    fn filtering_is_idempotent() {
        let (_, _, rows) = sample();
        let filter = ContributionFilter {
            contribution_type: Some(ContributionType::Tithe),
            ..Default::default()
        };

        let once = filter_contributions(&rows, &filter);
        let twice = filter_contributions(&once, &filter);

        assert_eq!(once, twice);
    }

    #[test]
    fn unique_members_counts_distinct_user_ids() {
        let (alice, _, mut rows) = sample();
        rows.push(row(
            alice,
            75.0,
            ContributionType::Sacrifice,
            (2024, 1, 3),
            "Alice Mwangi",
        ));

        let summary = summarize(&rows);

        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.unique_members, 2);
    }

    #[test]
    fn query_parsing_treats_empty_as_absent() {
        let query = DashboardQuery {
            date: Some("".to_string()),
            contribution_type: Some("  ".to_string()),
            member: Some("".to_string()),
        };

        let filter = ContributionFilter::from_query(&query).unwrap();

        assert_eq!(filter, ContributionFilter::default());
    }

    #[test]
    fn query_parsing_rejects_bad_values() {
        let bad_date = DashboardQuery {
            date: Some("01/02/2024".to_string()),
            ..Default::default()
        };
        assert!(ContributionFilter::from_query(&bad_date).is_err());

        let bad_type = DashboardQuery {
            contribution_type: Some("donation".to_string()),
            ..Default::default()
        };
        assert!(ContributionFilter::from_query(&bad_type).is_err());
    }

    #[test]
    fn query_parsing_accepts_the_full_triple() {
        let query = DashboardQuery {
            date: Some("2024-01-02".to_string()),
            contribution_type: Some("offering".to_string()),
            member: Some(" Bob ".to_string()),
        };

        let filter = ContributionFilter::from_query(&query).unwrap();

        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(filter.contribution_type, Some(ContributionType::Offering));
        assert_eq!(filter.member, Some("Bob".to_string()));
    }
}
