//! Rate limiter gating OTP issuance per phone number
//!
//! Tracks attempt counts inside a rolling window. The limiter never
//! blocks and never errors: anything unexpected fails open so an
//! infrastructure fault cannot lock a parent out of the portal.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed inside one window
    pub max_attempts: u32,
    /// Window length in minutes
    pub window_minutes: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window_minutes: 60,
        }
    }
}

/// Rate limiter entry
#[derive(Debug)]
struct RateLimitEntry {
    /// Attempts consumed in the current window
    attempts: u32,
    /// Instant at which the window resets
    window_reset_at: DateTime<Utc>,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining_attempts: u32,
    /// Minutes until the window resets, only set when blocked
    pub remaining_minutes: Option<i64>,
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether a phone number may request another OTP
    pub async fn check(&self, phone: &str) -> RateLimitDecision {
        self.check_at(phone, Utc::now()).await
    }

    pub(crate) async fn check_at(&self, phone: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entries = self.entries.lock().await;

        match entries.get_mut(phone) {
            Some(entry) if now <= entry.window_reset_at => {
                if entry.attempts >= self.config.max_attempts {
                    let seconds = (entry.window_reset_at - now).num_seconds().max(0);
                    let minutes = (seconds + 59) / 60;
                    info!("Rate limit hit for {}, {} minutes left", phone, minutes);
                    return RateLimitDecision {
                        allowed: false,
                        remaining_attempts: 0,
                        remaining_minutes: Some(minutes),
                    };
                }

                entry.attempts += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining_attempts: self.config.max_attempts - entry.attempts,
                    remaining_minutes: None,
                }
            }
            _ => {
                // First attempt, or the stored window has elapsed
                entries.insert(
                    phone.to_string(),
                    RateLimitEntry {
                        attempts: 1,
                        window_reset_at: now + Duration::minutes(self.config.window_minutes),
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining_attempts: self.config.max_attempts - 1,
                    remaining_minutes: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts: 3,
            window_minutes: 60,
        })
    }

    #[tokio::test]
    async fn fourth_attempt_in_window_is_blocked() {
        let limiter = limiter();
        let now = Utc::now();

        for remaining in [2, 1, 0] {
            let decision = limiter.check_at("5551234567", now).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining_attempts, remaining);
        }

        let decision = limiter.check_at("5551234567", now).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_attempts, 0);
        assert!(decision.remaining_minutes.unwrap() > 0);
    }

    #[tokio::test]
    async fn window_elapse_resets_counter() {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..3 {
            limiter.check_at("5551234567", now).await;
        }
        assert!(!limiter.check_at("5551234567", now).await.allowed);

        let later = now + Duration::minutes(61);
        let decision = limiter.check_at("5551234567", later).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining_attempts, 2);
    }

    #[tokio::test]
    async fn phones_are_limited_independently() {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..3 {
            limiter.check_at("5551234567", now).await;
        }
        assert!(!limiter.check_at("5551234567", now).await.allowed);
        assert!(limiter.check_at("5557654321", now).await.allowed);
    }
}
