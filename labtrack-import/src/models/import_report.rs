//! Import outcome returned to the caller

use super::ImportState;
use crate::reconciler::Reconciled;
use serde::{Deserialize, Serialize};

/// One logged failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub sheet: String,
    /// Spreadsheet row number; `None` when the whole sheet failed
    pub row: Option<usize>,
    pub message: String,
}

/// Per-sheet counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetReport {
    pub sheet: String,
    /// Data rows seen (blank rows excluded)
    pub rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl SheetReport {
    pub fn new(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: Reconciled) {
        match outcome {
            Reconciled::Inserted => self.inserted += 1,
            Reconciled::Updated => self.updated += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub state: ImportState,
    pub dry_run: bool,
    pub sheets: Vec<SheetReport>,
    pub failures: Vec<RowFailure>,
    pub duration_ms: u64,
}

impl ImportReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            state: ImportState::Validating,
            dry_run,
            sheets: Vec::new(),
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// True when no failure was recorded
    ///
    /// A dry run that rolled back cleanly is a success.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetReport> {
        self.sheets.iter().find(|s| s.sheet == name)
    }

    pub fn add_failure(&mut self, sheet: &str, row: Option<usize>, message: impl Into<String>) {
        self.failures.push(RowFailure {
            sheet: sheet.to_string(),
            row,
            message: message.into(),
        });
    }
}
