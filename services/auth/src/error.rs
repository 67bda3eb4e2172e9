//! Error type for the identity service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the identity endpoints
#[derive(Error, Debug)]
pub enum AuthError {
    /// Bad credentials; the message never says which half was wrong
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Duplicate sign-up
    #[error("An account with this email already exists")]
    EmailTaken,

    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),

    /// Credential attempt budget exhausted
    #[error("Too many attempts, please try again later")]
    RateLimited,

    /// Missing, expired, or revoked token
    #[error("Unauthorized")]
    Unauthorized,

    /// Internal server error
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for identity endpoint results
pub type AuthResult<T> = Result<T, AuthError>;
