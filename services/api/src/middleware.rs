//! Access-token validation and per-request snapshot resolution
//!
//! The identity service signs tokens; this service only verifies them. The
//! role set inside the claims is informational — authorization always works
//! from the role set re-derived from the store for the current request.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::context::{AuthSnapshot, SessionInfo, UserInfo};
use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims, as issued by the identity service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Account email
    pub email: String,
    /// Role tags held at issuance
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl SessionInfo {
    /// Session view of verified access-token claims
    pub fn from_claims(claims: &Claims) -> Self {
        SessionInfo {
            user: UserInfo {
                id: claims.sub,
                email: claims.email.clone(),
            },
            expires_at: claims.exp,
        }
    }
}

/// Verifier for tokens issued by the identity service
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from the environment
    ///
    /// # Environment Variables
    /// - `JWT_PUBLIC_KEY`: verification key, PEM text or path to a PEM file
    ///   (resolved against the CWD, then the crate root)
    pub fn from_env() -> anyhow::Result<Self> {
        let public_key = std::env::var("JWT_PUBLIC_KEY")
            .map_err(|_| anyhow::anyhow!("JWT_PUBLIC_KEY environment variable not set"))?;

        let public_key = if public_key.starts_with("-----BEGIN") {
            public_key
        } else {
            std::fs::read_to_string(&public_key)
                .or_else(|_| {
                    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                    path.push(&public_key);
                    std::fs::read_to_string(path)
                })
                .map_err(|e| anyhow::anyhow!("Failed to read public key file: {}", e))?
                .trim()
                .to_string()
        };

        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(TokenVerifier {
            decoding_key,
            validation,
        })
    }

    /// Validate a token and return the claims
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Snapshot for the current request, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthSnapshot);

/// Middleware for session-required routes: a missing or invalid token is
/// answered with 401
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.token_verifier.verify(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        ApiError::Unauthorized
    })?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized);
    }

    let snapshot = state
        .context
        .resolve(Some(SessionInfo::from_claims(&claims)))
        .await;

    req.extensions_mut().insert(CurrentUser(snapshot));

    Ok(next.run(req).await)
}

/// Resolve an optional bearer header into a snapshot. Anything short of a
/// valid access token settles into the unauthenticated state; no error is
/// surfaced.
pub async fn resolve_bearer(
    state: &AppState,
    bearer: Option<&Authorization<Bearer>>,
) -> AuthSnapshot {
    let Some(bearer) = bearer else {
        return AuthSnapshot::unauthenticated();
    };

    match state.token_verifier.verify(bearer.token()) {
        Ok(claims) if claims.token_type == TokenType::Access => {
            state
                .context
                .resolve(Some(SessionInfo::from_claims(&claims)))
                .await
        }
        _ => AuthSnapshot::unauthenticated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn verifier_requires_public_key() {
        unsafe {
            std::env::remove_var("JWT_PUBLIC_KEY");
        }

        assert!(TokenVerifier::from_env().is_err());
    }

    #[test]
    fn session_info_carries_identity_from_claims() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "member@example.com".to_string(),
            roles: vec!["admin".to_string()],
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            token_type: TokenType::Access,
        };

        let session = SessionInfo::from_claims(&claims);

        assert_eq!(session.user.id, claims.sub);
        assert_eq!(session.user.email, "member@example.com");
        assert_eq!(session.expires_at, claims.exp);
    }
}
