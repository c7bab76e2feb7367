//! Test Helper Utilities
//!
//! Shared utilities for testing labtrack-import

#![allow(dead_code)]

pub mod db_utils;
pub mod log_capture;
pub mod workbook;
pub mod xlsx;

pub use db_utils::{count_rows, create_test_db, seed_reference_data, SEEDED_SPECIMEN_ID};
pub use log_capture::{capture_logs, LogCapture};
pub use workbook::{run_row, sample_row, specimen_row, storage_row, workbook_with};
pub use xlsx::{excel_date, write_xlsx, Cell};
