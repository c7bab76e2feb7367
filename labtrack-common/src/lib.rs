//! # Labtrack Common Library
//!
//! Shared code for the labtrack tools including:
//! - Database bootstrap, migrations and the schema version gate
//! - Entity models for the sample-tracking store
//! - Closed vocabularies (sequencing methods, sample categories, ...)
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod vocabulary;

pub use error::{Error, Result};
