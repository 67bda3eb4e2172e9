//! Role-gated route protection
//!
//! The decision itself is a pure function over the current snapshot; the
//! middleware below is its HTTP rendition for the admin surface.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::context::AuthSnapshot;
use crate::middleware::{CurrentUser, resolve_bearer};
use crate::models::Role;
use crate::state::AppState;

/// Outcome of an access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No decision yet; the snapshot is still being derived
    Pending,
    /// The current role set intersects the required set
    Granted,
    /// No intersection; the caller is sent back to the home route
    Denied,
}

/// Decide access for a surface requiring any of `required`.
///
/// An unauthenticated caller has an empty role set and is therefore denied
/// through exactly the same path as a signed-in caller without a matching
/// role; the two are indistinguishable from the outside.
pub fn authorize(required: &[Role], snapshot: &AuthSnapshot) -> Access {
    if snapshot.loading {
        return Access::Pending;
    }

    if snapshot.roles.iter().any(|role| required.contains(role)) {
        Access::Granted
    } else {
        Access::Denied
    }
}

/// Middleware guarding the admin surface. Performs its own optional
/// credential resolution so that a missing token and an insufficient role
/// produce the identical redirect.
pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let snapshot = resolve_bearer(&state, bearer.as_ref().map(|h| &h.0)).await;

    match authorize(&[Role::Admin], &snapshot) {
        Access::Granted => {
            req.extensions_mut().insert(CurrentUser(snapshot));
            next.run(req).await
        }
        Access::Pending | Access::Denied => Redirect::to("/").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SessionInfo, UserInfo};
    use uuid::Uuid;

    fn snapshot(loading: bool, signed_in: bool, roles: Vec<Role>) -> AuthSnapshot {
        AuthSnapshot {
            loading,
            session: signed_in.then(|| SessionInfo {
                user: UserInfo {
                    id: Uuid::new_v4(),
                    email: "member@example.com".to_string(),
                },
                expires_at: 4_102_444_800,
            }),
            profile: None,
            roles,
        }
    }

    #[test]
    fn loading_gives_no_decision() {
        let s = snapshot(true, true, vec![Role::Admin]);
        assert_eq!(authorize(&[Role::Admin], &s), Access::Pending);
    }

    #[test]
    fn intersecting_role_set_is_granted() {
        let s = snapshot(false, true, vec![Role::Admin]);
        assert_eq!(authorize(&[Role::Admin], &s), Access::Granted);
    }

    #[test]
    fn empty_role_set_is_denied() {
        let s = snapshot(false, true, vec![]);
        assert_eq!(authorize(&[Role::Admin], &s), Access::Denied);
    }

    #[test]
    fn unauthenticated_and_unauthorized_are_indistinguishable() {
        let signed_out = snapshot(false, false, vec![]);
        let wrong_role = snapshot(false, true, vec![]);

        assert_eq!(
            authorize(&[Role::Admin], &signed_out),
            authorize(&[Role::Admin], &wrong_role)
        );
    }

    #[test]
    fn empty_required_set_never_grants() {
        let s = snapshot(false, true, vec![Role::Admin]);
        assert_eq!(authorize(&[], &s), Access::Denied);
    }
}
