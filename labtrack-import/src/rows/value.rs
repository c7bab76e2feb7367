//! Cell values before and after validation
//!
//! [`RawValue`] is what a sheet hands us: untyped, possibly blank, possibly
//! one of the spreadsheet "not a number" spellings. [`Value`] is a validated
//! scalar taken from a typed record, and can be coerced into the column
//! family a catalog attribute declares.

use chrono::{NaiveDate, NaiveDateTime};
use labtrack_common::db::DetailValue;
use labtrack_common::vocabulary::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Longest value accepted for `str` attributes
pub const MAX_DETAIL_STR_LEN: usize = 50;

/// Spellings spreadsheet tools use for an empty cell
const NULL_TOKENS: &[&str] = &["nan", "NaN", "NAN", "NaT", "NA", "N/A", "n/a", "null", "NULL", "None"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%b %d %Y",
    "%B %d %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Untyped cell as read from a sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Missing,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl RawValue {
    /// Cell text from a delimited file
    pub fn from_cell(cell: &str) -> Self {
        RawValue::Text(cell.to_string()).normalize()
    }

    /// Blank strings, NaN and NaT become `Missing`; text is trimmed
    pub fn normalize(self) -> Self {
        match self {
            RawValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed) {
                    RawValue::Missing
                } else {
                    RawValue::Text(trimmed.to_string())
                }
            }
            RawValue::Number(n) if n.is_nan() => RawValue::Missing,
            other => other,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// Convert to a validated scalar, keeping the cell's own type
    pub fn to_value(&self) -> Option<Value> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(s) => Some(Value::Str(s.clone())),
            RawValue::Number(n) => Some(number_value(*n)),
            RawValue::Bool(b) => Some(Value::Bool(*b)),
            RawValue::Date(d) => Some(Value::Date(*d)),
        }
    }

    pub fn as_string(&self) -> Option<String> {
        self.to_value().map(|v| v.to_string())
    }

    pub fn as_date(&self) -> Result<Option<NaiveDate>, String> {
        match self {
            RawValue::Missing => Ok(None),
            RawValue::Date(d) => Ok(Some(*d)),
            RawValue::Text(s) => parse_date(s).map(Some),
            _ => Err("Input should be a valid date".to_string()),
        }
    }

    pub fn as_int(&self) -> Result<Option<i64>, String> {
        self.to_value().map(|v| v.as_int()).transpose()
    }

    pub fn as_float(&self) -> Result<Option<f64>, String> {
        self.to_value().map(|v| v.as_float()).transpose()
    }

    pub fn as_bool(&self) -> Result<Option<bool>, String> {
        self.to_value().map(|v| v.as_bool()).transpose()
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::from_cell(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n).normalize()
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

/// One sheet row keyed by column header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: BTreeMap<String, RawValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (column, value) pairs; values are normalized
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        let column = column.into().trim().to_string();
        self.cells.insert(column, value.into().normalize());
    }

    /// Cell value; absent columns read as `Missing`
    pub fn get(&self, column: &str) -> &RawValue {
        self.cells.get(column).unwrap_or(&RawValue::Missing)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every column of `other` not already present
    pub fn merge_missing(&mut self, other: &RawRow) {
        for (column, value) in &other.cells {
            self.cells
                .entry(column.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Validated scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn as_int(&self) -> Result<i64, String> {
        let invalid = || "Input should be a valid integer".to_string();
        match self {
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(*f as i64),
            Value::Str(s) => s
                .parse::<i64>()
                .or_else(|_| match s.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                    _ => Err(invalid()),
                }),
            _ => Err(invalid()),
        }
    }

    pub fn as_float(&self) -> Result<f64, String> {
        let invalid = || "Input should be a valid number".to_string();
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Str(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    pub fn as_bool(&self) -> Result<bool, String> {
        let invalid = || "Input should be a valid boolean".to_string();
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Float(f) if *f == 0.0 => Ok(false),
            Value::Float(f) if *f == 1.0 => Ok(true),
            Value::Str(s) => parse_bool(s).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    pub fn as_date(&self) -> Result<NaiveDate, String> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Str(s) => parse_date(s),
            _ => Err("Input should be a valid date".to_string()),
        }
    }

    /// Coerce to the column family a catalog attribute declares
    pub fn coerce(&self, value_type: ValueType) -> Result<DetailValue, String> {
        match value_type {
            ValueType::Str => {
                let s = self.to_string();
                if s.chars().count() > MAX_DETAIL_STR_LEN {
                    Err(format!(
                        "String should have at most {} characters",
                        MAX_DETAIL_STR_LEN
                    ))
                } else {
                    Ok(DetailValue::Str(s))
                }
            }
            ValueType::Text => Ok(DetailValue::Text(self.to_string())),
            ValueType::Int => self.as_int().map(DetailValue::Int),
            ValueType::Float => self.as_float().map(DetailValue::Float),
            ValueType::Bool => self.as_bool().map(DetailValue::Bool),
            ValueType::Date => self.as_date().map(DetailValue::Date),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Spreadsheet numbers arrive as floats; keep whole numbers integral
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(datetime.date());
        }
    }

    Err("Input should be a valid date".to_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_blank_and_nan_cells_are_missing() {
        for cell in ["", "   ", "nan", "NaN", "NaT", "N/A"] {
            assert!(RawValue::from_cell(cell).is_missing(), "{:?} should be missing", cell);
        }
        assert!(RawValue::from(f64::NAN).is_missing());
        assert_eq!(RawValue::from_cell("  ABC "), RawValue::Text("ABC".to_string()));
    }

    #[test]
    fn test_absent_column_reads_missing() {
        let row = RawRow::from_pairs([("code", "R1")]);
        assert!(row.get("run_date").is_missing());
        assert!(!row.contains("run_date"));
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("2021-01-01"), Ok(ymd(2021, 1, 1)));
        assert_eq!(parse_date("2021-01-01 00:00:00"), Ok(ymd(2021, 1, 1)));
        assert_eq!(parse_date("15.03.2022"), Ok(ymd(2022, 3, 15)));
        assert_eq!(parse_date("03/15/2022"), Ok(ymd(2022, 3, 15)));
        assert_eq!(parse_date("1 Feb 2020"), Ok(ymd(2020, 2, 1)));
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_whole_numbers_stay_integral() {
        assert_eq!(RawValue::Number(3.0).to_value(), Some(Value::Int(3)));
        assert_eq!(RawValue::Number(3.5).to_value(), Some(Value::Float(3.5)));
        assert_eq!(Value::Str("4.0".into()).as_int(), Ok(4));
        assert!(Value::Str("4.2".into()).as_int().is_err());
    }

    #[test]
    fn test_coerce_to_declared_type() {
        assert_eq!(
            Value::from("12.5").coerce(ValueType::Float),
            Ok(DetailValue::Float(12.5))
        );
        assert_eq!(
            Value::from("yes").coerce(ValueType::Bool),
            Ok(DetailValue::Bool(true))
        );
        assert_eq!(
            Value::from("2021-06-30").coerce(ValueType::Date),
            Ok(DetailValue::Date(ymd(2021, 6, 30)))
        );
        assert_eq!(Value::Int(7).coerce(ValueType::Str), Ok(DetailValue::Str("7".into())));
        assert!(Value::from("lots").coerce(ValueType::Int).is_err());
    }

    #[test]
    fn test_str_attributes_are_length_limited() {
        let long = "x".repeat(MAX_DETAIL_STR_LEN + 1);
        assert!(Value::from(long.as_str()).coerce(ValueType::Str).is_err());
        assert!(Value::from(long.as_str()).coerce(ValueType::Text).is_ok());
    }
}
