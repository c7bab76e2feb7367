//! Data models for an import invocation
//!
//! - Import state machine
//! - Final report returned to the caller

pub mod import_report;
pub mod import_session;

pub use import_report::{ImportReport, RowFailure, SheetReport};
pub use import_session::{ImportSession, ImportState, StateTransition};
