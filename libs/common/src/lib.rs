//! Common library for the Izin Portal application
//!
//! This crate provides shared infrastructure used across the portal
//! services: the row-store gateway (the spreadsheet acting as the
//! system-of-record), error handling, and a bounded retry helper for
//! upstream calls.

pub mod error;
pub mod retry;
pub mod rowstore;
