//! Application state shared across handlers

use crate::context::{PgSnapshotSource, SessionContext};
use crate::middleware::TokenVerifier;
use crate::repositories::{ContributionRepository, ProfileRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub contributions: ContributionRepository,
    pub profiles: ProfileRepository,
    pub context: SessionContext<PgSnapshotSource>,
    pub token_verifier: TokenVerifier,
}
