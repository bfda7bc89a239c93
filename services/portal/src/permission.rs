//! Leave-permission status semantics and row-store operations
//!
//! The row store keeps a permission as a single decorated string inside
//! the permissions region of a student's row. Status semantics live in
//! [`PermissionStatus`]; turning a status into the stored string (and
//! leniently back) is a separate step, so the two concerns stay
//! decoupled.

use chrono::Local;
use serde::Serialize;
use tracing::info;

use common::error::{RowStoreError, RowStoreResult};
use common::rowstore::{CellRef, LAST_COLUMN, PERMISSIONS_START_COLUMN, RowStore};

use crate::models::STUDENT_NAME_COLUMN;

/// Leave date range, both ends as `dd.mm.yyyy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Channel an approval decision arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Sms,
    Voice,
}

impl Channel {
    /// Marker used inside the stored cell text
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Sms => "SMS",
            Channel::Voice => "Telefon",
        }
    }
}

/// Permission status with everything needed to render the cell text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStatus {
    Pending(DateRange),
    Approved {
        range: Option<DateRange>,
        channel: Channel,
        at: String,
    },
    Rejected {
        range: Option<DateRange>,
        channel: Channel,
        at: String,
    },
    Invalid {
        channel: Channel,
        at: String,
    },
}

impl PermissionStatus {
    /// Render to the row-store's decorated plain-text format
    pub fn render(&self) -> String {
        match self {
            PermissionStatus::Pending(range) => format!("{range} [BEKLEMEDE]"),
            PermissionStatus::Approved { range, channel, at } => match range {
                Some(range) => format!("ONAYLANDI ({range}) [{}: {at}]", channel.label()),
                None => format!("ONAYLANDI [{}: {at}]", channel.label()),
            },
            PermissionStatus::Rejected { range, channel, at } => match range {
                Some(range) => format!("REDDEDİLDİ ({range}) [{}: {at}]", channel.label()),
                None => format!("REDDEDİLDİ [{}: {at}]", channel.label()),
            },
            PermissionStatus::Invalid { channel, at } => {
                format!("GEÇERSİZ SEÇİM [{}: {at}]", channel.label())
            }
        }
    }
}

/// Coarse status parsed back out of a stored cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Approved,
    Rejected,
    Invalid,
    Unknown,
}

/// Classify a stored permission cell.
///
/// Parsing is deliberately lenient: rows edited by hand in the
/// spreadsheet still classify by their marker.
pub fn parse_status(cell: &str) -> StatusKind {
    let cell = cell.trim();
    if cell.contains("[BEKLEMEDE]") {
        StatusKind::Pending
    } else if cell.starts_with("ONAYLANDI") {
        StatusKind::Approved
    } else if cell.starts_with("REDDEDİLDİ") {
        StatusKind::Rejected
    } else if cell.starts_with("GEÇERSİZ") {
        StatusKind::Invalid
    } else {
        StatusKind::Unknown
    }
}

/// Timestamp label for approval markers
pub fn timestamp_label() -> String {
    Local::now().format("%d.%m.%Y %H:%M").to_string()
}

/// Find the lowest-indexed free cell in the permissions region of a row
pub async fn find_free_permission_cell(
    store: &dyn RowStore,
    row: u32,
) -> RowStoreResult<CellRef> {
    let cells = store.read_row(row).await?;

    for column in PERMISSIONS_START_COLUMN..=LAST_COLUMN {
        let occupied = cells
            .get(column)
            .map(|cell| !cell.trim().is_empty())
            .unwrap_or(false);
        if !occupied {
            return Ok(CellRef::new(column, row));
        }
    }

    Err(RowStoreError::ColumnsExhausted(row))
}

/// Append a permission as the next available slot in the fixed region
pub async fn append_permission(
    store: &dyn RowStore,
    row: u32,
    status: &PermissionStatus,
) -> RowStoreResult<CellRef> {
    let cell = find_free_permission_cell(store, row).await?;
    let text = status.render();
    store.write_cell(cell, &text).await?;
    info!("Permission written to {}: {}", cell, text);
    Ok(cell)
}

/// Locate the cell holding the pending marker for the given range
pub async fn find_pending_cell(
    store: &dyn RowStore,
    row: u32,
    range: &DateRange,
) -> RowStoreResult<Option<CellRef>> {
    let cells = store.read_row(row).await?;
    let pending_text = PermissionStatus::Pending(range.clone()).render();

    for column in PERMISSIONS_START_COLUMN..=LAST_COLUMN {
        if cells.get(column).map(String::as_str) == Some(pending_text.as_str()) {
            return Ok(Some(CellRef::new(column, row)));
        }
    }

    Ok(None)
}

/// Scan for a student's row by name.
///
/// Used by the voice flow, whose call session does not carry a row
/// reference.
pub async fn find_student_row_by_name(
    store: &dyn RowStore,
    student_name: &str,
) -> RowStoreResult<Option<u32>> {
    let rows = store.read_all().await?;

    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.get(STUDENT_NAME_COLUMN).map(String::as_str) == Some(student_name) {
            return Ok(Some(index as u32 + 1));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::rowstore::MemoryRowStore;

    #[test]
    fn renders_pending_marker() {
        let status = PermissionStatus::Pending(DateRange::new("01.08.2025", "05.08.2025"));
        assert_eq!(status.render(), "01.08.2025 - 05.08.2025 [BEKLEMEDE]");
    }

    #[test]
    fn renders_approved_markers_per_channel() {
        let sms = PermissionStatus::Approved {
            range: Some(DateRange::new("01.08.2025", "05.08.2025")),
            channel: Channel::Sms,
            at: "10.08.2025 14:30".to_string(),
        };
        assert_eq!(
            sms.render(),
            "ONAYLANDI (01.08.2025 - 05.08.2025) [SMS: 10.08.2025 14:30]"
        );

        let voice = PermissionStatus::Approved {
            range: None,
            channel: Channel::Voice,
            at: "10.08.2025 14:30".to_string(),
        };
        assert_eq!(voice.render(), "ONAYLANDI [Telefon: 10.08.2025 14:30]");
    }

    #[test]
    fn renders_rejected_and_invalid_markers() {
        let rejected = PermissionStatus::Rejected {
            range: None,
            channel: Channel::Voice,
            at: "10.08.2025 14:30".to_string(),
        };
        assert_eq!(rejected.render(), "REDDEDİLDİ [Telefon: 10.08.2025 14:30]");

        let invalid = PermissionStatus::Invalid {
            channel: Channel::Voice,
            at: "10.08.2025 14:30".to_string(),
        };
        assert_eq!(invalid.render(), "GEÇERSİZ SEÇİM [Telefon: 10.08.2025 14:30]");
    }

    #[test]
    fn classifies_stored_cells() {
        assert_eq!(
            parse_status("01.08.2025 - 05.08.2025 [BEKLEMEDE]"),
            StatusKind::Pending
        );
        assert_eq!(
            parse_status("ONAYLANDI (01.08.2025 - 05.08.2025) [SMS: 10.08.2025 14:30]"),
            StatusKind::Approved
        );
        assert_eq!(
            parse_status("REDDEDİLDİ [Telefon: 10.08.2025 14:30]"),
            StatusKind::Rejected
        );
        assert_eq!(
            parse_status("GEÇERSİZ SEÇİM [Telefon: 10.08.2025 14:30]"),
            StatusKind::Invalid
        );
        assert_eq!(parse_status("el ile girilmiş not"), StatusKind::Unknown);
    }

    fn student_row() -> Vec<String> {
        vec![
            "Ayşe Yılmaz".to_string(),
            "5551234567".to_string(),
            "Mehmet Yılmaz".to_string(),
            "5559876543".to_string(),
            "Zeynep Yılmaz".to_string(),
            "".to_string(),
            "12.05.2012".to_string(),
            "Yaz Okulu".to_string(),
            "1. Dönem".to_string(),
        ]
    }

    #[tokio::test]
    async fn appends_into_first_free_column_at_or_after_j() {
        let store = MemoryRowStore::with_rows(vec![vec!["header".to_string()], student_row()]);
        let status = PermissionStatus::Pending(DateRange::new("01.08.2025", "05.08.2025"));

        let first = append_permission(&store, 2, &status).await.unwrap();
        assert_eq!(first.a1(), "J2");

        let second = append_permission(&store, 2, &status).await.unwrap();
        assert_eq!(second.a1(), "K2");
    }

    #[tokio::test]
    async fn exhausted_region_is_an_error() {
        let mut row = student_row();
        row.resize(LAST_COLUMN + 1, "dolu".to_string());
        let store = MemoryRowStore::with_rows(vec![vec!["header".to_string()], row]);

        let status = PermissionStatus::Pending(DateRange::new("01.08.2025", "05.08.2025"));
        let err = append_permission(&store, 2, &status).await.unwrap_err();
        assert!(matches!(err, RowStoreError::ColumnsExhausted(2)));
    }

    #[tokio::test]
    async fn finds_pending_cell_by_exact_marker() {
        let store = MemoryRowStore::with_rows(vec![vec!["header".to_string()], student_row()]);
        let range = DateRange::new("01.08.2025", "05.08.2025");
        let status = PermissionStatus::Pending(range.clone());
        append_permission(&store, 2, &status).await.unwrap();

        let cell = find_pending_cell(&store, 2, &range).await.unwrap().unwrap();
        assert_eq!(cell.a1(), "J2");

        let other = DateRange::new("10.08.2025", "12.08.2025");
        assert!(find_pending_cell(&store, 2, &other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finds_student_row_by_name_scan() {
        let store = MemoryRowStore::with_rows(vec![vec!["header".to_string()], student_row()]);

        let row = find_student_row_by_name(&store, "Zeynep Yılmaz").await.unwrap();
        assert_eq!(row, Some(2));

        let missing = find_student_row_by_name(&store, "Ali Veli").await.unwrap();
        assert!(missing.is_none());
    }
}
