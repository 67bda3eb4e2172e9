//! Login attempt rate limiter
//!
//! Tracks attempts per key (the account email) in a rolling window and bans
//! a key that exhausts its budget. State is in-process; a restart clears it,
//! which is acceptable for a brute-force brake.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Attempt window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds once the budget is exhausted
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            ban_duration_seconds: 3600,
        }
    }
}

#[derive(Debug)]
struct AttemptRecord {
    attempts: u32,
    last_attempt: Instant,
    ban_expires: Option<Instant>,
}

/// In-process attempt limiter keyed by an arbitrary string
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, AttemptRecord>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert(AttemptRecord {
            attempts: 0,
            last_attempt: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now >= ban_expires {
                entry.attempts = 0;
                entry.ban_expires = None;
            } else {
                return Ok(false);
            }
        }

        if now.duration_since(entry.last_attempt) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            info!(
                "Banned key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return Ok(false);
        }

        entry.attempts += 1;
        entry.last_attempt = now;

        Ok(true)
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_config() -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: 2,
            window_seconds: 300,
            ban_duration_seconds: 3600,
        }
    }

    #[tokio::test]
    async fn allows_up_to_the_budget_then_bans() {
        let limiter = RateLimiter::new(strict_config());

        assert!(limiter.is_allowed("member@example.com").await.unwrap());
        assert!(limiter.is_allowed("member@example.com").await.unwrap());
        assert!(!limiter.is_allowed("member@example.com").await.unwrap());
        // Still banned on subsequent attempts
        assert!(!limiter.is_allowed("member@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(strict_config());

        assert!(limiter.is_allowed("a@example.com").await.unwrap());
        assert!(limiter.is_allowed("a@example.com").await.unwrap());
        assert!(!limiter.is_allowed("a@example.com").await.unwrap());

        assert!(limiter.is_allowed("b@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn expired_ban_resets_the_budget() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window_seconds: 300,
            ban_duration_seconds: 0,
        });

        assert!(limiter.is_allowed("a@example.com").await.unwrap());
        // Exhausts the budget and sets a zero-length ban
        assert!(!limiter.is_allowed("a@example.com").await.unwrap());
        // Ban already expired, so the budget starts over
        assert!(limiter.is_allowed("a@example.com").await.unwrap());
    }
}
