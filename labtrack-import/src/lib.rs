//! labtrack-import library interface
//!
//! Reconciles spreadsheet uploads (Runs, Specimens, Samples, Storage) and
//! results summaries into the sample-tracking database. Exposed as a library
//! for the binary and for integration testing.

pub mod db;
pub mod error;
pub mod importer;
pub mod models;
pub mod reconciler;
pub mod resolver;
pub mod rows;
pub mod sheet;
pub mod sync;

pub use crate::error::{ImportError, ImportResult, RowError};
pub use crate::importer::{import_summary, import_workbook, ImportOptions, Sheet};
pub use crate::models::{ImportReport, ImportState};
