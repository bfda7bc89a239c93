//! Row-store gateway for the Izin Portal application
//!
//! The system-of-record is a spreadsheet: one row per student, columns
//! `A`..`I` for the student record and a permissions region starting at
//! column `J`. This module exposes that store behind the [`RowStore`]
//! trait with an HTTP implementation against the Sheets values API and
//! an in-memory implementation used by tests and offline mode.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Mutex;
use tracing::info;

use crate::error::{RowStoreError, RowStoreResult};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// First column (0-based) of the permissions region, column `J`.
pub const PERMISSIONS_START_COLUMN: usize = 9;

/// Last addressable column (0-based), column `Z`.
pub const LAST_COLUMN: usize = 25;

/// Convert a 0-based column index to its letter (`0` → `A`, `9` → `J`).
pub fn column_letter(index: usize) -> char {
    debug_assert!(index <= LAST_COLUMN);
    (b'A' + index as u8) as char
}

/// Reference to a single cell: 0-based column index, 1-based row number
/// (the header is row 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub column: usize,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: usize, row: u32) -> Self {
        Self { column, row }
    }

    /// Render in A1 notation, e.g. `J5`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_letter(self.column), self.row)
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.a1())
    }
}

/// Read/write access to the tabular system-of-record
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read every row, header included. Cells never read beyond `Z`.
    async fn read_all(&self) -> RowStoreResult<Vec<Vec<String>>>;

    /// Read a single row by 1-based number. A row past the end of the
    /// sheet reads as empty, matching the values API.
    async fn read_row(&self, row: u32) -> RowStoreResult<Vec<String>>;

    /// Overwrite a single cell.
    async fn write_cell(&self, cell: CellRef, value: &str) -> RowStoreResult<()>;
}

/// Configuration for the Sheets-backed row store
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Spreadsheet identifier
    pub spreadsheet_id: String,
    /// OAuth bearer token for the service account
    pub access_token: String,
    /// API base URL (overridable for testing)
    pub base_url: String,
}

impl SheetsConfig {
    /// Create a new SheetsConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SHEETS_SPREADSHEET_ID`: spreadsheet identifier
    /// - `SHEETS_ACCESS_TOKEN`: bearer token for the values API
    /// - `SHEETS_BASE_URL`: API base (default: "https://sheets.googleapis.com")
    pub fn from_env() -> RowStoreResult<Self> {
        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID").map_err(|_| {
            RowStoreError::Configuration("SHEETS_SPREADSHEET_ID environment variable not set".into())
        })?;
        let access_token = std::env::var("SHEETS_ACCESS_TOKEN").map_err(|_| {
            RowStoreError::Configuration("SHEETS_ACCESS_TOKEN environment variable not set".into())
        })?;
        let base_url = std::env::var("SHEETS_BASE_URL")
            .unwrap_or_else(|_| "https://sheets.googleapis.com".to_string());

        Ok(SheetsConfig {
            spreadsheet_id,
            access_token,
            base_url,
        })
    }
}

/// Row store backed by the Sheets values API
pub struct SheetsRowStore {
    client: Client,
    config: SheetsConfig,
    retry: RetryPolicy,
}

impl SheetsRowStore {
    /// Create a new Sheets row store
    pub fn new(config: SheetsConfig) -> Self {
        info!(
            "Sheets row store initialized for spreadsheet {}",
            config.spreadsheet_id
        );
        Self {
            client: Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.config.base_url, self.config.spreadsheet_id, range
        )
    }

    async fn get_values(&self, range: &str) -> RowStoreResult<Vec<Vec<String>>> {
        let url = self.values_url(range);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(RowStoreError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RowStoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(RowStoreError::Transport)?;

        let rows = payload
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(rows)
    }
}

#[async_trait]
impl RowStore for SheetsRowStore {
    async fn read_all(&self) -> RowStoreResult<Vec<Vec<String>>> {
        retry_with_backoff(&self.retry, "rowstore read_all", || {
            self.get_values("A:Z")
        })
        .await
    }

    async fn read_row(&self, row: u32) -> RowStoreResult<Vec<String>> {
        let range = format!("{row}:{row}");
        let rows = retry_with_backoff(&self.retry, "rowstore read_row", || {
            self.get_values(&range)
        })
        .await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn write_cell(&self, cell: CellRef, value: &str) -> RowStoreResult<()> {
        let url = format!("{}?valueInputOption=RAW", self.values_url(&cell.a1()));
        let body = json!({ "values": [[value]] });

        retry_with_backoff(&self.retry, "rowstore write_cell", || async {
            let response = self
                .client
                .put(&url)
                .bearer_auth(&self.config.access_token)
                .json(&body)
                .send()
                .await
                .map_err(RowStoreError::Transport)?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(RowStoreError::Api {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Ok(())
        })
        .await?;

        info!("Row-store cell {} updated", cell);
        Ok(())
    }
}

/// In-memory row store for tests and offline operation
#[derive(Default)]
pub struct MemoryRowStore {
    rows: Mutex<Vec<Vec<String>>>,
}

impl MemoryRowStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with rows (header first)
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn read_all(&self) -> RowStoreResult<Vec<Vec<String>>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn read_row(&self, row: u32) -> RowStoreResult<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(row as usize - 1).cloned().unwrap_or_default())
    }

    async fn write_cell(&self, cell: CellRef, value: &str) -> RowStoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row_index = cell.row as usize - 1;
        if rows.len() <= row_index {
            rows.resize(row_index + 1, Vec::new());
        }
        let row = &mut rows[row_index];
        if row.len() <= cell.column {
            row.resize(cell.column + 1, String::new());
        }
        row[cell.column] = value.to_string();
        Ok(())
    }
}
