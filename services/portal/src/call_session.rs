//! Call sessions for voice approvals
//!
//! A short call identifier embedded in the webhook URL maps to the data
//! needed to render voice prompts. Sessions live for one hour at most;
//! expired entries are swept opportunistically on every read and after
//! every insert, bounding growth from abandoned calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::snapshot::Snapshot;

/// Call session lifetime
const CALL_TTL_HOURS: i64 = 1;

/// Context for one outbound approval call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub student_name: String,
    pub parent_phone: String,
    pub expiry: DateTime<Utc>,
}

impl CallSession {
    pub fn new(student_name: &str, parent_phone: &str) -> Self {
        Self {
            student_name: student_name.to_string(),
            parent_phone: parent_phone.to_string(),
            expiry: Utc::now() + Duration::hours(CALL_TTL_HOURS),
        }
    }
}

/// Generate a short opaque call identifier
pub fn generate_call_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// In-memory call session store, keyed by call id
#[derive(Clone)]
pub struct CallSessionStore {
    entries: Arc<Mutex<HashMap<String, CallSession>>>,
    snapshot: Option<Snapshot>,
}

impl CallSessionStore {
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

    fn persist(&self, entries: &HashMap<String, CallSession>) {
        if let Some(snapshot) = &self.snapshot {
            snapshot.persist(entries);
        }
    }

    fn sweep(&self, entries: &mut HashMap<String, CallSession>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, session| now <= session.expiry);
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(entries);
            info!("Cleaned up {} expired call sessions", removed);
        }
    }

    /// Store a call session and sweep expired ones
    pub async fn set(&self, call_id: &str, session: CallSession) {
        let mut entries = self.entries.lock().await;
        entries.insert(call_id.to_string(), session);
        self.sweep(&mut entries, Utc::now());
        self.persist(&entries);
    }

    /// Look up a call session, sweeping expired entries first
    pub async fn get(&self, call_id: &str) -> Option<CallSession> {
        self.get_at(call_id, Utc::now()).await
    }

    pub(crate) async fn get_at(&self, call_id: &str, now: DateTime<Utc>) -> Option<CallSession> {
        let mut entries = self.entries.lock().await;
        self.sweep(&mut entries, now);
        entries.get(call_id).cloned()
    }

    /// Remove a call session once a terminal response was processed
    pub async fn delete(&self, call_id: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(call_id).is_some() {
            self.persist(&entries);
            info!("Removed call session {}", call_id);
        }
    }
}

impl Default for CallSessionStore {
    fn default() -> Self {
        Self::new()
    }
}
