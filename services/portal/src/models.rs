//! Student records mapped from the row store
//!
//! One row per student: columns `A`..`I` hold the record, the
//! permissions region starts at column `J`.

use serde::Serialize;

use common::rowstore::PERMISSIONS_START_COLUMN;

use crate::permission::{StatusKind, parse_status};
use crate::validation::normalize_phone;

/// 0-based column of the student name (column `E`)
pub const STUDENT_NAME_COLUMN: usize = 4;

/// A stored permission cell with its parsed status
#[derive(Debug, Clone, Serialize)]
pub struct PermissionEntry {
    pub text: String,
    pub status: StatusKind,
}

/// Student record
#[derive(Debug, Clone, Serialize)]
pub struct Student {
    /// 1-based row in the row store
    pub row: u32,
    pub mother_name: String,
    pub mother_phone: String,
    pub father_name: String,
    pub father_phone: String,
    pub student_name: String,
    pub student_phone: String,
    pub birth_date: String,
    pub program: String,
    pub term: String,
    pub permissions: Vec<PermissionEntry>,
}

impl Student {
    /// Map a raw row (1-based row number, header is row 1)
    pub fn from_row(row: u32, cells: &[String]) -> Self {
        let field = |index: usize| cells.get(index).cloned().unwrap_or_default();

        let permissions = cells
            .iter()
            .skip(PERMISSIONS_START_COLUMN)
            .filter(|cell| !cell.trim().is_empty())
            .map(|cell| PermissionEntry {
                text: cell.trim().to_string(),
                status: parse_status(cell),
            })
            .collect();

        Self {
            row,
            mother_name: field(0),
            mother_phone: field(1),
            father_name: field(2),
            father_phone: field(3),
            student_name: field(STUDENT_NAME_COLUMN),
            student_phone: field(5),
            birth_date: field(6),
            program: field(7),
            term: field(8),
            permissions,
        }
    }

    /// Whether either parent's phone matches the given one
    pub fn belongs_to(&self, phone: &str) -> bool {
        let needle = normalize_phone(phone);
        !needle.is_empty()
            && (normalize_phone(&self.mother_phone) == needle
                || normalize_phone(&self.father_phone) == needle)
    }
}

/// Map every data row (skipping the header) to students
pub fn students_from_rows(rows: &[Vec<String>]) -> Vec<Student> {
    rows.iter()
        .enumerate()
        .skip(1)
        .map(|(index, cells)| Student::from_row(index as u32 + 1, cells))
        .collect()
}
