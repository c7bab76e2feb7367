//! Field-by-field validation of a [`RawRow`]
//!
//! A [`RowReader`] consumes declared columns one at a time and records every
//! failure instead of stopping at the first, so a row with three bad fields
//! reports all three. Columns never asked for become the record's extras.

use crate::error::ValidationErrors;
use crate::rows::value::{RawRow, RawValue, Value};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

pub const FIELD_REQUIRED: &str = "Field required";

/// Undeclared columns of a row, by header
pub type Extras = BTreeMap<String, Value>;

pub struct RowReader<'a> {
    row: &'a RawRow,
    consumed: BTreeSet<String>,
    errors: ValidationErrors,
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a RawRow) -> Self {
        Self {
            row,
            consumed: BTreeSet::new(),
            errors: ValidationErrors::new(),
        }
    }

    fn take(&mut self, name: &str) -> &'a RawValue {
        self.consumed.insert(name.to_string());
        self.row.get(name)
    }

    /// Record `msg` against `loc`
    pub fn error(&mut self, loc: &str, msg: impl Into<String>) {
        self.errors.push(loc, msg);
    }

    /// Keep the parsed value, or record its error
    fn accept<T>(&mut self, name: &str, parsed: Result<Option<T>, String>) -> Option<T> {
        match parsed {
            Ok(value) => value,
            Err(msg) => {
                self.errors.push(name, msg);
                None
            }
        }
    }

    /// Like `accept`, but an absent value is itself an error
    fn require<T>(&mut self, name: &str, parsed: Result<Option<T>, String>) -> Option<T> {
        let value = self.accept(name, parsed);
        if value.is_none() && !self.errors.has(name) {
            self.errors.push(name, FIELD_REQUIRED);
        }
        value
    }

    pub fn required_str(&mut self, name: &str, max_len: usize) -> Option<String> {
        let parsed = bounded(self.take(name).as_string(), max_len);
        self.require(name, parsed)
    }

    pub fn optional_str(&mut self, name: &str, max_len: usize) -> Option<String> {
        let parsed = bounded(self.take(name).as_string(), max_len);
        self.accept(name, parsed)
    }

    /// Unbounded text
    pub fn required_text(&mut self, name: &str) -> Option<String> {
        let parsed = Ok(self.take(name).as_string());
        self.require(name, parsed)
    }

    pub fn optional_text(&mut self, name: &str) -> Option<String> {
        self.take(name).as_string()
    }

    pub fn required_date(&mut self, name: &str) -> Option<NaiveDate> {
        let parsed = self.take(name).as_date();
        self.require(name, parsed)
    }

    pub fn optional_date(&mut self, name: &str) -> Option<NaiveDate> {
        let parsed = self.take(name).as_date();
        self.accept(name, parsed)
    }

    pub fn optional_int(&mut self, name: &str) -> Option<i64> {
        let parsed = self.take(name).as_int();
        self.accept(name, parsed)
    }

    /// Integer strictly greater than zero
    pub fn optional_positive_int(&mut self, name: &str) -> Option<i64> {
        let parsed = self.take(name).as_int().and_then(|v| match v {
            Some(n) if n <= 0 => Err("Input should be greater than 0".to_string()),
            other => Ok(other),
        });
        self.accept(name, parsed)
    }

    pub fn optional_float(&mut self, name: &str) -> Option<f64> {
        let parsed = self.take(name).as_float();
        self.accept(name, parsed)
    }

    pub fn optional_bool(&mut self, name: &str) -> Option<bool> {
        let parsed = self.take(name).as_bool();
        self.accept(name, parsed)
    }

    /// Value from a closed vocabulary
    pub fn required_vocab<T: FromStr<Err = String>>(&mut self, name: &str) -> Option<T> {
        let parsed = self.take(name).as_string().map(|s| s.parse::<T>()).transpose();
        self.require(name, parsed)
    }

    pub fn optional_vocab<T: FromStr<Err = String>>(&mut self, name: &str) -> Option<T> {
        let parsed = self.take(name).as_string().map(|s| s.parse::<T>()).transpose();
        self.accept(name, parsed)
    }

    /// Comma-separated vocabulary values, deduplicated
    ///
    /// Every token is validated; an empty cell gives an empty set.
    pub fn optional_vocab_set<T>(&mut self, name: &str) -> BTreeSet<T>
    where
        T: FromStr<Err = String> + Ord,
    {
        let mut set = BTreeSet::new();
        let Some(text) = self.take(name).as_string() else {
            return set;
        };

        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<T>() {
                Ok(value) => {
                    set.insert(value);
                }
                Err(msg) => self.errors.push(name, format!("{} (got '{}')", msg, token)),
            }
        }
        set
    }

    /// ISO-3166 alpha-3 code, upper-cased
    pub fn required_country_code(&mut self, name: &str) -> Option<String> {
        let parsed = self.take(name).as_string().map(|code| {
            if code.chars().count() != 3 {
                Err("String should have exactly 3 characters".to_string())
            } else if !code.chars().all(|c| c.is_ascii_alphabetic()) {
                Err("Country code should contain only letters".to_string())
            } else {
                Ok(code.to_ascii_uppercase())
            }
        });
        self.require(name, parsed.transpose())
    }

    /// Finish the row: errors if any field failed, else the extras
    pub fn finish(self) -> Result<Extras, ValidationErrors> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let extras = self
            .row
            .iter()
            .filter(|(column, _)| !self.consumed.contains(*column))
            .filter_map(|(column, value)| value.to_value().map(|v| (column.to_string(), v)))
            .collect();

        Ok(extras)
    }
}

fn bounded(value: Option<String>, max_len: usize) -> Result<Option<String>, String> {
    match value {
        Some(s) if s.chars().count() > max_len => Err(format!(
            "String should have at most {} characters",
            max_len
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrack_common::vocabulary::{NucleicAcidType, SequencingMethod};

    #[test]
    fn test_collects_every_failure() {
        let row = RawRow::from_pairs([("code", "R".repeat(21).as_str()), ("run_date", "soon")]);
        let mut reader = RowReader::new(&row);
        reader.required_str("code", 20);
        reader.required_date("run_date");
        reader.required_str("site", 20);

        let errors = reader.finish().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.has("code"));
        assert!(errors.has("run_date"));
        assert!(errors
            .iter()
            .any(|e| e.loc == "site" && e.msg == FIELD_REQUIRED));
    }

    #[test]
    fn test_unconsumed_columns_become_extras() {
        let row = RawRow::from_pairs([("code", "R1"), ("spike_name_1", "lambda"), ("blank", "")]);
        let mut reader = RowReader::new(&row);
        reader.required_str("code", 20);

        let extras = reader.finish().unwrap();
        assert_eq!(extras.get("spike_name_1"), Some(&Value::Str("lambda".into())));
        assert!(!extras.contains_key("code"));
        assert!(!extras.contains_key("blank"));
    }

    #[test]
    fn test_vocab_error_names_value() {
        let row = RawRow::from_pairs([("sequencing_method", "nanopore")]);
        let mut reader = RowReader::new(&row);
        assert_eq!(reader.required_vocab::<SequencingMethod>("sequencing_method"), None);

        let errors = reader.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.errors[0].msg.contains("'illumina'"));
    }

    #[test]
    fn test_nucleic_acid_set_deduplicates() {
        let row = RawRow::from_pairs([("nucleic_acid_type", "DNA, RNA, DNA")]);
        let mut reader = RowReader::new(&row);
        let set = reader.optional_vocab_set::<NucleicAcidType>("nucleic_acid_type");
        reader.finish().unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&NucleicAcidType::Dna));
        assert!(set.contains(&NucleicAcidType::Rna));
    }

    #[test]
    fn test_bad_token_in_set_is_reported() {
        let row = RawRow::from_pairs([("nucleic_acid_type", "DNA, XNA")]);
        let mut reader = RowReader::new(&row);
        reader.optional_vocab_set::<NucleicAcidType>("nucleic_acid_type");

        let errors = reader.finish().unwrap_err();
        assert!(errors.errors[0].msg.contains("XNA"));
    }

    #[test]
    fn test_country_code_shape() {
        for (cell, ok) in [("gbr", true), ("GB", false), ("G1R", false)] {
            let row = RawRow::from_pairs([("country", cell)]);
            let mut reader = RowReader::new(&row);
            let code = reader.required_country_code("country");
            assert_eq!(reader.finish().is_ok(), ok, "{}", cell);
            if ok {
                assert_eq!(code.as_deref(), Some("GBR"));
            }
        }
    }

    #[test]
    fn test_positive_int() {
        let row = RawRow::from_pairs([("n", "0")]);
        let mut reader = RowReader::new(&row);
        reader.optional_positive_int("n");
        assert!(reader.finish().is_err());
    }
}
