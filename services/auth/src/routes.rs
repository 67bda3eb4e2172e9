//! Identity service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AuthError, AuthResult},
    jwt::TokenType,
    models::{LoginCredentials, NewProfile, NewUser, Role, User},
    validation::{validate_email, validate_name, validate_password},
};

/// Lifetime of a password-reset token in seconds
const RESET_TOKEN_TTL_SECS: u64 = 3600;

/// Request for account registration
#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Response for account registration
#[derive(Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: String,
    pub message: String,
}

/// Response for token issuance
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Request carrying a refresh token (refresh and logout)
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request for a password-reset token
#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Request consuming a password-reset token
#[derive(Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

/// Create the router for the identity service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

/// Fetch the role set for token claims; a failed read degrades to no roles
/// rather than failing the sign-in.
async fn roles_for_claims(state: &AppState, user_id: Uuid) -> Vec<Role> {
    match state.roles.roles_for_user(user_id).await {
        Ok(roles) => roles,
        Err(e) => {
            warn!("Failed to fetch roles for user {}: {}", user_id, e);
            vec![]
        }
    }
}

async fn issue_tokens(state: &AppState, user: &User) -> AuthResult<TokenResponse> {
    let roles = roles_for_claims(state, user.id).await;

    let access_token = state
        .jwt_service
        .generate_access_token(user, &roles)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::Internal
        })?;

    let refresh_token = state
        .jwt_service
        .generate_refresh_token(user)
        .map_err(|e| {
            error!("Failed to generate refresh token: {}", e);
            AuthError::Internal
        })?;

    state
        .session_manager
        .create_session(user.id, &refresh_token)
        .await
        .map_err(|e| {
            error!("Failed to store session: {}", e);
            AuthError::Internal
        })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
    })
}

/// Account registration; creates the user and, implicitly, the profile row
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AuthResult<impl IntoResponse> {
    validate_email(&payload.email).map_err(AuthError::Validation)?;
    validate_password(&payload.password).map_err(AuthError::Validation)?;
    validate_name(&payload.first_name, "First name").map_err(AuthError::Validation)?;
    validate_name(&payload.last_name, "Last name").map_err(AuthError::Validation)?;

    let new_user = NewUser {
        email: payload.email.clone(),
        password: payload.password.clone(),
    };

    let user = state.users.create(&new_user).await.map_err(|e| {
        if is_unique_violation(&e) {
            AuthError::EmailTaken
        } else {
            error!("Failed to create user: {}", e);
            AuthError::Internal
        }
    })?;

    let new_profile = NewProfile {
        id: user.id,
        first_name: Some(payload.first_name),
        last_name: Some(payload.last_name),
    };

    state.profiles.create(&new_profile).await.map_err(|e| {
        error!("Failed to create profile for user {}: {}", user.id, e);
        AuthError::Internal
    })?;

    info!("Registered new account for user {}", user.id);

    let response = SignupResponse {
        user_id: user.id,
        email: user.email,
        message: "Account created. You can now sign in.".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign-in endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> AuthResult<impl IntoResponse> {
    info!("Login attempt for {}", payload.email);

    let allowed = state
        .rate_limiter
        .is_allowed(&payload.email)
        .await
        .map_err(|e| {
            error!("Rate limiter failure: {}", e);
            AuthError::Internal
        })?;

    if !allowed {
        return Err(AuthError::RateLimited);
    }

    let user = state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            AuthError::Internal
        })?
        .ok_or(AuthError::InvalidCredentials)?;

    let verified = state
        .users
        .verify_password(&user, &payload.password)
        .await
        .map_err(|e| {
            error!("Failed to verify password: {}", e);
            AuthError::Internal
        })?;

    if !verified {
        return Err(AuthError::InvalidCredentials);
    }

    let response = issue_tokens(&state, &user).await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Refresh endpoint; rotates the refresh token on every use
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    let claims = state
        .jwt_service
        .validate_token(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AuthError::Unauthorized);
    }

    let is_blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, &payload.refresh_token)
        .await
        .map_err(|e| {
            error!("Failed to check token blacklist: {}", e);
            AuthError::Internal
        })?;

    if is_blacklisted {
        return Err(AuthError::Unauthorized);
    }

    let session_valid = state
        .session_manager
        .is_session_valid(claims.sub, &payload.refresh_token)
        .await
        .map_err(|e| {
            error!("Failed to check session: {}", e);
            AuthError::Internal
        })?;

    if !session_valid {
        return Err(AuthError::Unauthorized);
    }

    let user = state
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            AuthError::Internal
        })?
        .ok_or(AuthError::Unauthorized)?;

    let roles = roles_for_claims(&state, user.id).await;

    let access_token = state
        .jwt_service
        .generate_access_token(&user, &roles)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::Internal
        })?;

    let new_refresh_token = state
        .jwt_service
        .rotate_refresh_token(&state.redis_pool, &user, &payload.refresh_token)
        .await
        .map_err(|e| {
            error!("Failed to rotate refresh token: {}", e);
            AuthError::Internal
        })?;

    state
        .session_manager
        .create_session(user.id, &new_refresh_token)
        .await
        .map_err(|e| {
            error!("Failed to update session: {}", e);
            AuthError::Internal
        })?;

    let response = TokenResponse {
        access_token,
        refresh_token: new_refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Sign-out endpoint; revokes the refresh token and clears the session
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    let claims = state
        .jwt_service
        .validate_token(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AuthError::Unauthorized);
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| {
            error!("Failed to get current time: {}", e);
            AuthError::Internal
        })?
        .as_secs();

    let expiry = claims.exp.saturating_sub(now);
    state
        .jwt_service
        .blacklist_token(&state.redis_pool, &payload.refresh_token, expiry)
        .await
        .map_err(|e| {
            error!("Failed to blacklist token: {}", e);
            AuthError::Internal
        })?;

    state
        .session_manager
        .delete_session(claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to delete session: {}", e);
            AuthError::Internal
        })?;

    info!("User {} signed out", claims.sub);

    Ok((
        StatusCode::OK,
        Json(json!({"message": "Logged out successfully"})),
    ))
}

fn reset_token_key(token: &str) -> String {
    format!("password_reset:{}", token)
}

/// Request a password-reset token. The response is identical whether or not
/// the account exists, so this endpoint is not an account oracle.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> AuthResult<impl IntoResponse> {
    let user = state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            AuthError::Internal
        })?;

    if let Some(user) = user {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();

        state
            .redis_pool
            .set(
                &reset_token_key(&token),
                &user.id.to_string(),
                Some(RESET_TOKEN_TTL_SECS),
            )
            .await
            .map_err(|e| {
                error!("Failed to store reset token: {}", e);
                AuthError::Internal
            })?;

        info!("Password reset token issued for user {}", user.id);
        // Delivery stub until a mail relay is wired in
        debug!("Password reset token for {}: {}", user.email, token);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "If an account exists for this address, a reset link has been sent."
        })),
    ))
}

/// Consume a password-reset token and set a new password
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> AuthResult<impl IntoResponse> {
    validate_password(&payload.new_password).map_err(AuthError::Validation)?;

    let key = reset_token_key(&payload.token);
    let user_id = state
        .redis_pool
        .get(&key)
        .await
        .map_err(|e| {
            error!("Failed to read reset token: {}", e);
            AuthError::Internal
        })?
        .ok_or(AuthError::Unauthorized)?;

    let user_id: Uuid = user_id.parse().map_err(|_| {
        error!("Malformed user id stored for reset token");
        AuthError::Internal
    })?;

    state
        .users
        .update_password(user_id, &payload.new_password)
        .await
        .map_err(|e| {
            error!("Failed to update password: {}", e);
            AuthError::Internal
        })?;

    state.redis_pool.delete(&key).await.map_err(|e| {
        error!("Failed to discard reset token: {}", e);
        AuthError::Internal
    })?;

    // Any live session predates the new password; force a fresh sign-in
    state
        .session_manager
        .delete_session(user_id)
        .await
        .map_err(|e| {
            error!("Failed to delete session: {}", e);
            AuthError::Internal
        })?;

    info!("Password reset completed for user {}", user_id);

    Ok((
        StatusCode::OK,
        Json(json!({"message": "Password updated. Please sign in again."})),
    ))
}
