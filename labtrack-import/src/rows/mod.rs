//! Validated row model
//!
//! Untyped sheet rows in, typed records (or every field error) out.

pub mod reader;
pub mod records;
pub mod value;

pub use reader::{Extras, RowReader, FIELD_REQUIRED};
pub use records::{
    ImportRecord, RunRecord, SampleRecord, SpecimenRecord, StorageRecord, SummaryRecord,
};
pub use value::{RawRow, RawValue, Value};
