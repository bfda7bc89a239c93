//! Authenticated-portal sessions
//!
//! A session links an opaque token to a verified phone number for 24
//! hours. The store is transport-agnostic; the HTTP-only cookie that
//! carries the token is set and cleared by the routes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::snapshot::Snapshot;

/// Session lifetime
const SESSION_TTL_HOURS: i64 = 24;

/// Verified session for a parent phone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub phone: String,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session store, keyed by opaque token
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<String, AuthSession>>>,
    snapshot: Option<Snapshot>,
}

impl SessionStore {
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

    fn persist(&self, entries: &HashMap<String, AuthSession>) {
        if let Some(snapshot) = &self.snapshot {
            snapshot.persist(entries);
        }
    }

    /// Create a session for a verified phone and return its token
    pub async fn create(&self, phone: &str) -> String {
        self.create_at(phone, Utc::now()).await
    }

    pub(crate) async fn create_at(&self, phone: &str, now: DateTime<Utc>) -> String {
        let session_id = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().await;
        entries.insert(
            session_id.clone(),
            AuthSession {
                phone: phone.to_string(),
                verified_at: now,
                expires_at: now + Duration::hours(SESSION_TTL_HOURS),
            },
        );
        self.persist(&entries);
        info!("Created auth session for {}", phone);
        session_id
    }

    /// Validate a token, returning the phone it belongs to.
    ///
    /// Expired sessions are deleted lazily on the validation that finds
    /// them.
    pub async fn validate(&self, session_id: &str) -> Option<String> {
        self.validate_at(session_id, Utc::now()).await
    }

    pub(crate) async fn validate_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if session_id.is_empty() {
            return None;
        }

        let mut entries = self.entries.lock().await;
        let session = entries.get(session_id)?;

        if now > session.expires_at {
            entries.remove(session_id);
            self.persist(&entries);
            info!("Session expired");
            return None;
        }

        Some(session.phone.clone())
    }

    /// Revoke a session, returning whether an entry existed
    pub async fn revoke(&self, session_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(session_id).is_some();
        if removed {
            self.persist(&entries);
            info!("Revoked session");
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_session_is_valid_with_its_phone() {
        let store = SessionStore::new();
        let id = store.create("5551234567").await;

        assert_eq!(store.validate(&id).await.as_deref(), Some("5551234567"));
    }

    #[tokio::test]
    async fn session_invalid_after_expiry() {
        let store = SessionStore::new();
        let created = Utc::now() - Duration::hours(25);
        let id = store.create_at("5551234567", created).await;

        assert!(store.validate(&id).await.is_none());
        // Lazy deletion: the entry is gone, so revoke finds nothing
        assert!(!store.revoke(&id).await);
    }

    #[tokio::test]
    async fn empty_token_is_invalid() {
        let store = SessionStore::new();
        assert!(store.validate("").await.is_none());
    }

    #[tokio::test]
    async fn revoke_removes_the_session() {
        let store = SessionStore::new();
        let id = store.create("5551234567").await;

        assert!(store.revoke(&id).await);
        assert!(store.validate(&id).await.is_none());
        assert!(!store.revoke(&id).await);
    }
}
