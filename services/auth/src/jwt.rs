//! JWT issuance and validation
//!
//! Access and refresh tokens are signed with RS256. Refresh tokens rotate on
//! use; revoked refresh tokens are held in Redis until their natural expiry
//! so a stolen token cannot be replayed after logout.

use anyhow::Result;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::{Role, User};
use common::cache::RedisPool;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens (PEM)
    pub private_key: String,
    /// Public key for verifying tokens (PEM)
    pub public_key: String,
    /// Access token expiration time in seconds
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds
    pub refresh_token_expiry: u64,
}

/// Read a PEM value from the environment, accepting either inline PEM or a
/// path to a key file (resolved against the CWD, then the crate root).
fn read_pem(var: &str) -> Result<String> {
    let value = std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let pem = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read key file for {}: {}", var, e))?;

    Ok(pem.trim().to_string())
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY`: signing key, PEM text or path to a PEM file
    /// - `JWT_PUBLIC_KEY`: verification key, PEM text or path to a PEM file
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let private_key = read_pem("JWT_PRIVATE_KEY")?;
        let public_key = read_pem("JWT_PUBLIC_KEY")?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(604_800);

        Ok(JwtConfig {
            private_key,
            public_key,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// JWT claims
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

fn unix_now() -> Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs();
    Ok(now)
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token carrying the user's current role set
    pub fn generate_access_token(&self, user: &User, roles: &[Role]) -> Result<String> {
        let now = unix_now()?;

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
            iat: now,
            exp: now + self.config.access_token_expiry,
            token_type: TokenType::Access,
        };

        let token = encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?;
        Ok(token)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        let now = unix_now()?;

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            roles: vec![],
            iat: now,
            exp: now + self.config.refresh_token_expiry,
            token_type: TokenType::Refresh,
        };

        let token = encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Check whether a token has been revoked
    pub async fn is_token_blacklisted(&self, redis_pool: &RedisPool, token: &str) -> Result<bool> {
        let key = format!("blacklisted_token:{}", token);
        let result = redis_pool.get(&key).await?;
        Ok(result.is_some())
    }

    /// Revoke a token for `expiry` seconds (its remaining lifetime)
    pub async fn blacklist_token(
        &self,
        redis_pool: &RedisPool,
        token: &str,
        expiry: u64,
    ) -> Result<()> {
        let key = format!("blacklisted_token:{}", token);
        redis_pool.set(&key, "1", Some(expiry)).await?;
        Ok(())
    }

    /// Get the access token expiry time in seconds
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time in seconds
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }

    /// Rotate a refresh token: revoke the old one for its remaining lifetime
    /// and issue a replacement
    pub async fn rotate_refresh_token(
        &self,
        redis_pool: &RedisPool,
        user: &User,
        old_refresh_token: &str,
    ) -> Result<String> {
        let claims = self.validate_token(old_refresh_token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(anyhow::anyhow!("Token is not a refresh token"));
        }

        if claims.sub != user.id {
            return Err(anyhow::anyhow!("Token does not belong to user"));
        }

        let now = unix_now()?;
        let expiry = claims.exp.saturating_sub(now);
        self.blacklist_token(redis_pool, old_refresh_token, expiry)
            .await?;

        let new_refresh_token = self.generate_refresh_token(user)?;

        Ok(new_refresh_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn claims_round_trip_through_json() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "member@example.com".to_string(),
            roles: vec!["admin".to_string()],
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            token_type: TokenType::Access,
        };

        let json = serde_json::to_string(&claims).unwrap();
        let parsed: Claims = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.sub, claims.sub);
        assert_eq!(parsed.email, claims.email);
        assert_eq!(parsed.roles, claims.roles);
        assert_eq!(parsed.token_type, TokenType::Access);
    }

    #[test]
    #[serial]
    fn config_requires_keys() {
        unsafe {
            std::env::remove_var("JWT_PRIVATE_KEY");
            std::env::remove_var("JWT_PUBLIC_KEY");
        }

        assert!(JwtConfig::from_env().is_err());
    }
}
