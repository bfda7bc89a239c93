//! One-time password store backing SMS login
//!
//! At most one pending OTP exists per phone number; re-issuing
//! overwrites the previous code. Codes are single-use: every outcome
//! other than a plain mismatch removes the entry so it cannot be
//! replayed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::snapshot::Snapshot;

/// OTP validity window
const OTP_TTL_MINUTES: i64 = 5;
/// Failed verification attempts allowed per code
const MAX_VERIFY_ATTEMPTS: u32 = 3;

/// Pending one-time password for a phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneOtp {
    pub code: String,
    pub expiry: DateTime<Utc>,
    pub attempts: u32,
}

/// Why a verification attempt failed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpVerifyError {
    #[error("no pending code for this phone")]
    NotFound,
    #[error("code expired")]
    Expired,
    #[error("too many failed attempts")]
    AttemptsExceeded,
    #[error("code mismatch")]
    Mismatch,
}

/// Generate a uniformly random 6-digit code
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// In-memory OTP store, keyed by phone number
#[derive(Clone)]
pub struct OtpStore {
    entries: Arc<Mutex<HashMap<String, PhoneOtp>>>,
    snapshot: Option<Snapshot>,
}

impl OtpStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            snapshot: None,
        }
    }

    /// Create a store that restores from and persists to a snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let entries = snapshot.load();
        Self {
            entries: Arc::new(Mutex::new(entries)),
            snapshot: Some(snapshot),
        }
    }

    fn persist(&self, entries: &HashMap<String, PhoneOtp>) {
        if let Some(snapshot) = &self.snapshot {
            snapshot.persist(entries);
        }
    }

    /// Issue a fresh code for a phone, overwriting any pending one
    pub async fn issue(&self, phone: &str) -> String {
        self.issue_at(phone, Utc::now()).await
    }

    pub(crate) async fn issue_at(&self, phone: &str, now: DateTime<Utc>) -> String {
        let code = generate_code();
        let mut entries = self.entries.lock().await;
        entries.insert(
            phone.to_string(),
            PhoneOtp {
                code: code.clone(),
                expiry: now + Duration::minutes(OTP_TTL_MINUTES),
                attempts: 0,
            },
        );
        self.persist(&entries);
        info!("Issued OTP for {}", phone);
        code
    }

    /// Verify a submitted code
    pub async fn verify(&self, phone: &str, submitted: &str) -> Result<(), OtpVerifyError> {
        self.verify_at(phone, submitted, Utc::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        phone: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpVerifyError> {
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get_mut(phone) else {
            debug!("OTP verify for {}: no pending code", phone);
            return Err(OtpVerifyError::NotFound);
        };

        if now > entry.expiry {
            entries.remove(phone);
            self.persist(&entries);
            info!("OTP for {} expired", phone);
            return Err(OtpVerifyError::Expired);
        }

        if entry.attempts >= MAX_VERIFY_ATTEMPTS {
            entries.remove(phone);
            self.persist(&entries);
            info!("OTP for {} exhausted its attempts", phone);
            return Err(OtpVerifyError::AttemptsExceeded);
        }

        if entry.code != submitted {
            entry.attempts += 1;
            let attempts = entry.attempts;
            self.persist(&entries);
            debug!("OTP mismatch for {} (attempt {})", phone, attempts);
            return Err(OtpVerifyError::Mismatch);
        }

        // Codes are single-use
        entries.remove(phone);
        self.persist(&entries);
        info!("OTP verified for {}", phone);
        Ok(())
    }
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_code() {
        let store = OtpStore::new();
        let first = store.issue("5551234567").await;
        let second = store.issue("5551234567").await;

        if first != second {
            assert_eq!(
                store.verify("5551234567", &first).await,
                Err(OtpVerifyError::Mismatch)
            );
        }
        assert!(store.verify("5551234567", &second).await.is_ok());
    }

    #[tokio::test]
    async fn verified_code_is_single_use() {
        let store = OtpStore::new();
        let code = store.issue("5551234567").await;

        assert!(store.verify("5551234567", &code).await.is_ok());
        assert_eq!(
            store.verify("5551234567", &code).await,
            Err(OtpVerifyError::NotFound)
        );
    }

    #[tokio::test]
    async fn expired_code_is_removed() {
        let store = OtpStore::new();
        let issued_at = Utc::now() - Duration::minutes(10);
        let code = store.issue_at("5551234567", issued_at).await;

        assert_eq!(
            store.verify("5551234567", &code).await,
            Err(OtpVerifyError::Expired)
        );
        assert_eq!(
            store.verify("5551234567", &code).await,
            Err(OtpVerifyError::NotFound)
        );
    }

    #[tokio::test]
    async fn fourth_attempt_with_correct_code_is_rejected() {
        let store = OtpStore::new();
        let code = store.issue("5551234567").await;

        for _ in 0..3 {
            assert_eq!(
                store.verify("5551234567", "000000").await,
                Err(OtpVerifyError::Mismatch)
            );
        }

        assert_eq!(
            store.verify("5551234567", &code).await,
            Err(OtpVerifyError::AttemptsExceeded)
        );
        // The entry is purged once attempts are exhausted
        assert_eq!(
            store.verify("5551234567", &code).await,
            Err(OtpVerifyError::NotFound)
        );
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let code = {
            let store =
                OtpStore::with_snapshot(Snapshot::new(dir.path(), "otp.json"));
            store.issue("5551234567").await
        };

        let restored = OtpStore::with_snapshot(Snapshot::new(dir.path(), "otp.json"));
        assert!(restored.verify("5551234567", &code).await.is_ok());
    }
}
