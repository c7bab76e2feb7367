//! Error types for labtrack-import
//!
//! Row-level problems ([`RowError`]) are logged and counted but never stop
//! the batch. [`ImportError`] is reserved for conditions that end an import
//! (or a whole sheet) before rows are reconciled.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One failing field of a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Column the problem was found in
    pub loc: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(loc: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.loc, self.msg)
    }
}

/// Every field-level failure found while validating one row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loc: impl Into<String>, msg: impl Into<String>) {
        self.errors.push(FieldError::new(loc, msg));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Whether any error is reported against `loc`
    pub fn has(&self, loc: &str) -> bool {
        self.errors.iter().any(|e| e.loc == loc)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Failure of a single row; the batch continues
#[derive(Debug, Error)]
pub enum RowError {
    /// One or more fields failed validation
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// A required reference (run, specimen, sample, country, ...) is absent
    #[error("{0}")]
    NotFound(String),

    /// The row is internally inconsistent
    #[error("{0}")]
    Invalid(String),

    /// Child rows (details, spikes, results) that could not be stored
    #[error("{}", .0.join("; "))]
    Children(Vec<String>),

    /// Store rejected a read or write for this row
    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

impl RowError {
    /// One log line per underlying problem, each `loc : msg` where known
    pub fn messages(&self) -> Vec<String> {
        match self {
            RowError::Validation(errors) => errors.iter().map(|e| e.to_string()).collect(),
            RowError::Children(problems) => problems.clone(),
            other => vec![format!(": {}", other)],
        }
    }
}

/// Failure that ends the import (or a sheet) outright
#[derive(Debug, Error)]
pub enum ImportError {
    /// Schema gate, connection or transaction failure
    #[error(transparent)]
    Common(#[from] labtrack_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A sheet or input file could not be read
    #[error("{sheet}: {message}")]
    Sheet { sheet: String, message: String },
}

impl ImportError {
    pub fn sheet(sheet: impl Into<String>, message: impl fmt::Display) -> Self {
        ImportError::Sheet {
            sheet: sheet.into(),
            message: message.to_string(),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Sheet {
            sheet: "csv".to_string(),
            message: err.to_string(),
        }
    }
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;
