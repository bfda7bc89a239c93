//! SMS approval codes for leave requests
//!
//! A 6-digit code maps to the leave request it approves. `verify` does
//! not consume the code: the caller still has to apply the row-store
//! patch, which can fail independently of code validity, so deletion is
//! an explicit step once processing finished.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::snapshot::Snapshot;

/// Approval code validity window
pub const APPROVAL_TTL_MINUTES: i64 = 30;
/// Processing attempts allowed before the code is discarded
pub const MAX_APPROVAL_ATTEMPTS: u32 = 3;

/// Pending leave-request approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub student_name: String,
    /// `dd.mm.yyyy`
    pub start_date: String,
    /// `dd.mm.yyyy`
    pub end_date: String,
    /// 1-based row of the student in the row store
    pub student_row: u32,
    pub parent_phone: String,
    pub expiry: DateTime<Utc>,
    pub attempts: u32,
}

impl ApprovalRequest {
    pub fn new(
        student_name: &str,
        start_date: &str,
        end_date: &str,
        student_row: u32,
        parent_phone: &str,
    ) -> Self {
        Self {
            student_name: student_name.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            student_row,
            parent_phone: parent_phone.to_string(),
            expiry: Utc::now() + Duration::minutes(APPROVAL_TTL_MINUTES),
            attempts: 0,
        }
    }
}

/// In-memory approval code store, keyed by the 6-digit code
#[derive(Clone)]
pub struct ApprovalStore {
    entries: Arc<Mutex<HashMap<String, ApprovalRequest>>>,
    snapshot: Option<Snapshot>,
}

impl ApprovalStore {
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

    fn persist(&self, entries: &HashMap<String, ApprovalRequest>) {
        if let Some(snapshot) = &self.snapshot {
            snapshot.persist(entries);
        }
    }

    /// Unconditional upsert
    pub async fn store(&self, code: &str, request: ApprovalRequest) {
        let mut entries = self.entries.lock().await;
        info!("Stored approval code for {}", request.student_name);
        entries.insert(code.to_string(), request);
        self.persist(&entries);
    }

    /// Look up a code without consuming it.
    ///
    /// Expired entries are deleted as a side effect and report as
    /// absent, the same as an unknown code.
    pub async fn verify(&self, code: &str) -> Option<ApprovalRequest> {
        self.verify_at(code, Utc::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Option<ApprovalRequest> {
        let mut entries = self.entries.lock().await;
        let request = entries.get(code)?;

        if now > request.expiry {
            entries.remove(code);
            self.persist(&entries);
            info!("Approval code expired");
            return None;
        }

        Some(request.clone())
    }

    /// Count a processing attempt against a code
    pub async fn record_attempt(&self, code: &str) {
        let mut entries = self.entries.lock().await;
        if let Some(request) = entries.get_mut(code) {
            request.attempts += 1;
            self.persist(&entries);
        }
    }

    /// Explicit removal after successful application or exhausted
    /// attempts
    pub async fn delete(&self, code: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(code).is_some() {
            self.persist(&entries);
            info!("Removed approval code");
        }
    }
}

impl Default for ApprovalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ApprovalRequest {
        ApprovalRequest::new("Zeynep Yılmaz", "01.08.2025", "05.08.2025", 5, "5551234567")
    }

    #[tokio::test]
    async fn verify_does_not_consume_the_code() {
        let store = ApprovalStore::new();
        store.store("123456", request()).await;

        assert!(store.verify("123456").await.is_some());
        assert!(store.verify("123456").await.is_some());
    }

    #[tokio::test]
    async fn unknown_code_is_absent() {
        let store = ApprovalStore::new();
        assert!(store.verify("000000").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_deleted_on_verify() {
        let store = ApprovalStore::new();
        let mut req = request();
        req.expiry = Utc::now() - Duration::minutes(1);
        store.store("123456", req).await;

        assert!(store.verify("123456").await.is_none());
        // Second call sees a plain absence, not an expiry
        assert!(store.verify("123456").await.is_none());
    }

    #[tokio::test]
    async fn attempts_accumulate() {
        let store = ApprovalStore::new();
        store.store("123456", request()).await;

        store.record_attempt("123456").await;
        store.record_attempt("123456").await;

        let req = store.verify("123456").await.unwrap();
        assert_eq!(req.attempts, 2);
    }

    #[tokio::test]
    async fn delete_removes_the_code() {
        let store = ApprovalStore::new();
        store.store("123456", request()).await;
        store.delete("123456").await;
        assert!(store.verify("123456").await.is_none());
    }
}
