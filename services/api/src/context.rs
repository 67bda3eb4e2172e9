//! Session and role derivation
//!
//! One component owns the answer to "who is signed in and what can they
//! do". It is constructed explicitly and passed by reference; nothing here
//! is process-global. Two entry points share the same derivation:
//!
//! - [`SessionContext::resolve`] derives an [`AuthSnapshot`] for a single
//!   verified session, used per request by the HTTP middleware.
//! - [`SessionContext::spawn_watcher`] runs the event-driven form: session
//!   change events arrive on a channel, a single consumer task re-derives
//!   the snapshot and republishes it for readers. Every event restarts
//!   derivation from scratch. Each derivation carries a generation tag; a
//!   result whose generation has been superseded by a newer event is
//!   discarded, never published.
//!
//! A failed roles read degrades to an empty role set, so a store hiccup can
//! never grant privileges. A failed profile read leaves the profile unset
//! and is only logged.

use std::future::Future;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Profile, Role};
use crate::repositories::{ProfileRepository, RoleRepository};

/// Identity attached to a verified session
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
}

/// A verified session, as carried by an access token
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub user: UserInfo,
    /// Expiry of the backing token, seconds since the Unix epoch
    pub expires_at: u64,
}

/// Immutable view of the current authentication state
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    /// True while a derivation for the latest session event is in flight
    pub loading: bool,
    pub session: Option<SessionInfo>,
    pub profile: Option<Profile>,
    pub roles: Vec<Role>,
}

impl AuthSnapshot {
    /// The settled signed-out state
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    fn resolving(session: Option<SessionInfo>) -> Self {
        Self {
            loading: true,
            session,
            profile: None,
            roles: vec![],
        }
    }

    /// The signed-in user, if any
    pub fn user(&self) -> Option<&UserInfo> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Profile name when filled in, account email otherwise
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.profile.as_ref().and_then(Profile::display_name) {
            return Some(name);
        }
        self.user().map(|u| u.email.clone())
    }
}

/// The reads a derivation needs. The production source wraps the Postgres
/// repositories; tests substitute doubles.
pub trait SnapshotSource: Clone + Send + Sync + 'static {
    /// Profile keyed by user id
    fn profile_by_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Profile>>> + Send;

    /// Role set for a user id
    fn roles_by_user_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Vec<Role>>> + Send;
}

/// Production [`SnapshotSource`] over the Postgres repositories
#[derive(Clone)]
pub struct PgSnapshotSource {
    profiles: ProfileRepository,
    roles: RoleRepository,
}

impl PgSnapshotSource {
    pub fn new(profiles: ProfileRepository, roles: RoleRepository) -> Self {
        Self { profiles, roles }
    }
}

impl SnapshotSource for PgSnapshotSource {
    fn profile_by_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Profile>>> + Send {
        let profiles = self.profiles.clone();
        async move { profiles.find_by_id(user_id).await }
    }

    fn roles_by_user_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Vec<Role>>> + Send {
        let roles = self.roles.clone();
        async move { roles.roles_for_user(user_id).await }
    }
}

/// A session lifecycle event
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn(SessionInfo),
    SignedOut,
}

async fn derive_snapshot<S: SnapshotSource>(source: &S, session: SessionInfo) -> AuthSnapshot {
    let user_id = session.user.id;

    // Callers see no error from a missing profile; the gap is log-only.
    let profile = match source.profile_by_id(user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Profile fetch failed for user {}: {}", user_id, e);
            None
        }
    };

    // Fail open to "no privileges", never fail the derivation.
    let roles = match source.roles_by_user_id(user_id).await {
        Ok(roles) => roles,
        Err(e) => {
            warn!(
                "Roles fetch failed for user {}: {}; treating as no roles",
                user_id, e
            );
            vec![]
        }
    };

    AuthSnapshot {
        loading: false,
        session: Some(session),
        profile,
        roles,
    }
}

/// Session/role context over a snapshot source
#[derive(Clone)]
pub struct SessionContext<S: SnapshotSource> {
    source: S,
}

impl<S: SnapshotSource> SessionContext<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Derive the snapshot for a verified session; `None` settles straight
    /// into the unauthenticated state.
    pub async fn resolve(&self, session: Option<SessionInfo>) -> AuthSnapshot {
        match session {
            None => AuthSnapshot::unauthenticated(),
            Some(session) => derive_snapshot(&self.source, session).await,
        }
    }

    /// Start the event-driven watcher. A single consumer task owns all state
    /// transitions; readers subscribe to the published snapshots.
    pub fn spawn_watcher(&self) -> SessionWatcher {
        let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(AuthSnapshot::unauthenticated());
        let (done_tx, mut done_rx) = mpsc::channel::<(u64, AuthSnapshot)>(16);
        let source = self.source.clone();

        let task = tokio::spawn(async move {
            let mut generation: u64 = 0;

            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        let Some(event) = event else { break };
                        generation += 1;

                        match event {
                            SessionEvent::SignedOut => {
                                let _ = snapshot_tx.send(AuthSnapshot::resolving(None));
                                let _ = snapshot_tx.send(AuthSnapshot::unauthenticated());
                            }
                            SessionEvent::SignedIn(session) => {
                                let _ = snapshot_tx.send(AuthSnapshot::resolving(Some(session.clone())));

                                let source = source.clone();
                                let done = done_tx.clone();
                                let tag = generation;
                                tokio::spawn(async move {
                                    let snapshot = derive_snapshot(&source, session).await;
                                    let _ = done.send((tag, snapshot)).await;
                                });
                            }
                        }
                    }
                    Some((tag, snapshot)) = done_rx.recv() => {
                        if tag == generation {
                            let _ = snapshot_tx.send(snapshot);
                        } else {
                            debug!(
                                "Discarding superseded derivation (generation {}, current {})",
                                tag, generation
                            );
                        }
                    }
                }
            }
        });

        SessionWatcher {
            events: event_tx,
            snapshots: snapshot_rx,
            task,
        }
    }
}

/// Handle to a running session watcher
pub struct SessionWatcher {
    events: mpsc::Sender<SessionEvent>,
    snapshots: watch::Receiver<AuthSnapshot>,
    task: JoinHandle<()>,
}

impl SessionWatcher {
    /// Report a sign-in
    pub async fn signed_in(&self, session: SessionInfo) -> anyhow::Result<()> {
        self.events
            .send(SessionEvent::SignedIn(session))
            .await
            .map_err(|_| anyhow::anyhow!("Session watcher is gone"))
    }

    /// Report a sign-out
    pub async fn signed_out(&self) -> anyhow::Result<()> {
        self.events
            .send(SessionEvent::SignedOut)
            .await
            .map_err(|_| anyhow::anyhow!("Session watcher is gone"))
    }

    /// Subscribe to published snapshots
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshots.clone()
    }

    /// The most recently published snapshot
    pub fn current(&self) -> AuthSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the consumer task and wait for it to finish
    pub async fn shutdown(self) {
        drop(self.events);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Access, authorize};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio_test::assert_ok;

    fn member(id: Uuid) -> SessionInfo {
        SessionInfo {
            user: UserInfo {
                id,
                email: "member@example.com".to_string(),
            },
            expires_at: 4_102_444_800,
        }
    }

    fn stored_profile(id: Uuid) -> Profile {
        Profile {
            id,
            first_name: Some("Amina".to_string()),
            last_name: Some("Odhiambo".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Test double for the snapshot source. The optional gate parks the
    /// profile read until the test releases a permit, which lets tests hold
    /// a derivation in flight.
    #[derive(Clone, Default)]
    struct StubSource {
        profile: Option<Profile>,
        roles: Vec<Role>,
        fail_profile: bool,
        fail_roles: bool,
        gate: Option<Arc<Semaphore>>,
    }

    impl SnapshotSource for StubSource {
        fn profile_by_id(
            &self,
            _user_id: Uuid,
        ) -> impl Future<Output = anyhow::Result<Option<Profile>>> + Send {
            let this = self.clone();
            async move {
                if let Some(gate) = &this.gate {
                    gate.acquire().await.unwrap().forget();
                }
                if this.fail_profile {
                    anyhow::bail!("profile store offline");
                }
                Ok(this.profile.clone())
            }
        }

        fn roles_by_user_id(
            &self,
            _user_id: Uuid,
        ) -> impl Future<Output = anyhow::Result<Vec<Role>>> + Send {
            let this = self.clone();
            async move {
                if this.fail_roles {
                    anyhow::bail!("role store offline");
                }
                Ok(this.roles.clone())
            }
        }
    }

    #[tokio::test]
    async fn resolve_without_session_is_unauthenticated() {
        let context = SessionContext::new(StubSource::default());

        let snapshot = context.resolve(None).await;

        assert!(!snapshot.loading);
        assert!(snapshot.session.is_none());
        assert!(snapshot.profile.is_none());
        assert!(snapshot.roles.is_empty());
    }

    #[tokio::test]
    async fn resolve_populates_profile_and_roles() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![Role::Admin],
            ..Default::default()
        });

        let snapshot = context.resolve(Some(member(user_id))).await;

        assert!(!snapshot.loading);
        assert_eq!(snapshot.user().map(|u| u.id), Some(user_id));
        assert_eq!(snapshot.display_name(), Some("Amina Odhiambo".to_string()));
        assert!(snapshot.is_admin());
    }

    #[tokio::test]
    async fn roles_read_failure_degrades_to_no_roles() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            fail_roles: true,
            ..Default::default()
        });

        let snapshot = context.resolve(Some(member(user_id))).await;

        assert!(snapshot.roles.is_empty());
        assert!(!snapshot.is_admin());
        // Everything else still derived
        assert!(snapshot.profile.is_some());
        assert!(snapshot.session.is_some());
    }

    #[tokio::test]
    async fn profile_read_failure_is_silent() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            roles: vec![Role::Admin],
            fail_profile: true,
            ..Default::default()
        });

        let snapshot = context.resolve(Some(member(user_id))).await;

        assert!(snapshot.profile.is_none());
        assert!(snapshot.is_admin());
        // Display name falls back to the account email
        assert_eq!(snapshot.display_name(), Some("member@example.com".to_string()));
    }

    #[tokio::test]
    async fn watcher_grants_admin_after_admin_sign_in() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![Role::Admin],
            ..Default::default()
        });
        let watcher = context.spawn_watcher();
        let mut rx = watcher.subscribe();

        assert_ok!(watcher.signed_in(member(user_id)).await);

        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading {
                assert_eq!(authorize(&[Role::Admin], &snapshot), Access::Granted);
                break;
            }
        }

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn watcher_denies_admin_for_member_without_roles() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![],
            ..Default::default()
        });
        let watcher = context.spawn_watcher();
        let mut rx = watcher.subscribe();

        assert_ok!(watcher.signed_in(member(user_id)).await);

        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading {
                assert!(snapshot.session.is_some());
                assert_eq!(authorize(&[Role::Admin], &snapshot), Access::Denied);
                break;
            }
        }

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn sign_out_settles_back_to_unauthenticated() {
        let user_id = Uuid::new_v4();
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![Role::Admin],
            ..Default::default()
        });
        let watcher = context.spawn_watcher();
        let mut rx = watcher.subscribe();

        assert_ok!(watcher.signed_in(member(user_id)).await);
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading && snapshot.is_admin() {
                break;
            }
        }

        // Signing out re-evaluates the guard: the admin view is gone
        assert_ok!(watcher.signed_out().await);
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading && snapshot.session.is_none() {
                assert_eq!(authorize(&[Role::Admin], &snapshot), Access::Denied);
                assert!(snapshot.roles.is_empty());
                break;
            }
        }

        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn derivation_publishes_loading_then_settled() {
        let user_id = Uuid::new_v4();
        let gate = Arc::new(Semaphore::new(0));
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![Role::Admin],
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let watcher = context.spawn_watcher();
        let mut rx = watcher.subscribe();

        assert_ok!(watcher.signed_in(member(user_id)).await);

        // The derivation is parked on the gate, so the loading snapshot is
        // the latest published state
        rx.changed().await.unwrap();
        {
            let snapshot = rx.borrow_and_update().clone();
            assert!(snapshot.loading);
            assert!(snapshot.session.is_some());
            assert_eq!(authorize(&[Role::Admin], &snapshot), Access::Pending);
        }

        gate.add_permits(1);

        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading {
                assert!(snapshot.is_admin());
                break;
            }
        }

        watcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_derivation_is_discarded() {
        let user_id = Uuid::new_v4();
        let gate = Arc::new(Semaphore::new(0));
        let context = SessionContext::new(StubSource {
            profile: Some(stored_profile(user_id)),
            roles: vec![Role::Admin],
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let watcher = context.spawn_watcher();
        let mut rx = watcher.subscribe();

        // First event's derivation parks on the gate...
        assert_ok!(watcher.signed_in(member(user_id)).await);
        // ...and a sign-out supersedes it before it can finish
        assert_ok!(watcher.signed_out().await);

        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow().clone();
            if !snapshot.loading && snapshot.session.is_none() {
                break;
            }
        }

        // Let the stale derivation complete; its result must not surface
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = watcher.current();
        assert!(snapshot.session.is_none());
        assert!(snapshot.roles.is_empty());
        assert!(!snapshot.is_admin());

        watcher.shutdown().await;
    }
}
