//! Tabular input sources
//!
//! A workbook is a set of named sheets. On disk it is either a spreadsheet
//! file (xlsx, xls, ods) or a directory holding one `<Sheet>.csv` per sheet;
//! in tests it is a [`MemoryWorkbook`]. All of them yield rows in file order
//! with normalized cells.

use crate::error::{ImportError, ImportResult};
use crate::rows::{RawRow, RawValue};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Named sheets of tabular data
pub trait SheetSource {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// All data rows of `sheet`, header excluded, in file order
    fn rows(&self, sheet: &str) -> ImportResult<Vec<RawRow>>;
}

/// Open a spreadsheet file, or a directory of CSV sheets
pub fn open_workbook(path: &Path) -> ImportResult<Box<dyn SheetSource>> {
    if path.is_dir() {
        Ok(Box::new(CsvWorkbook::open(path)?))
    } else {
        Ok(Box::new(XlsxWorkbook::open(path)?))
    }
}

/// Spreadsheet file, every worksheet read up front
///
/// The first row of a worksheet is its header. Typed cells keep their type:
/// numbers, booleans and date-formatted cells do not pass through text.
#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    path: PathBuf,
    sheets: BTreeMap<String, Result<Vec<RawRow>, String>>,
}

impl XlsxWorkbook {
    pub fn open(path: impl Into<PathBuf>) -> ImportResult<Self> {
        let path = path.into();
        let mut workbook = open_workbook_auto(&path).map_err(|e| {
            ImportError::sheet("workbook", format!("cannot open {}: {}", path.display(), e))
        })?;

        let mut sheets = BTreeMap::new();
        for name in workbook.sheet_names().to_vec() {
            let rows = workbook
                .worksheet_range(&name)
                .map(|range| range_rows(&range))
                .map_err(|e| e.to_string());
            if let Ok(rows) = &rows {
                debug!("Read {} rows from worksheet {}", rows.len(), name);
            }
            sheets.insert(name, rows);
        }

        Ok(Self { path, sheets })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }
}

impl SheetSource for XlsxWorkbook {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn rows(&self, sheet: &str) -> ImportResult<Vec<RawRow>> {
        match self.sheets.get(sheet) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(ImportError::sheet(sheet, message)),
            None => Err(ImportError::sheet(sheet, "Worksheet not found")),
        }
    }
}

fn range_rows(range: &Range<Data>) -> Vec<RawRow> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_string(),
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    rows.map(|cells| {
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells) {
            if header.is_empty() {
                continue;
            }
            row.insert(header.as_str(), cell_value(cell));
        }
        row
    })
    .collect()
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Missing,
        Data::String(s) | Data::DurationIso(s) => RawValue::from_cell(s),
        Data::Float(f) => RawValue::from(*f),
        Data::Int(i) => RawValue::from(*i as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => RawValue::Date(date),
            None => RawValue::from_cell(&cell.to_string()),
        },
    }
}

/// Directory of `<Sheet>.csv` files
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn open(dir: impl Into<PathBuf>) -> ImportResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ImportError::sheet(
                "workbook",
                format!("{} is not a directory", dir.display()),
            ));
        }
        Ok(Self { dir })
    }

    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }
}

impl SheetSource for CsvWorkbook {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn rows(&self, sheet: &str) -> ImportResult<Vec<RawRow>> {
        let path = self.sheet_path(sheet);
        read_csv_file(&path).map_err(|e| match e {
            ImportError::Sheet { message, .. } => ImportError::sheet(sheet, message),
            other => ImportError::sheet(sheet, other),
        })
    }
}

/// Sheets held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: BTreeMap<String, Vec<RawRow>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: &str, rows: Vec<RawRow>) -> Self {
        self.sheets.insert(sheet.to_string(), rows);
        self
    }

    pub fn insert_sheet(&mut self, sheet: &str, rows: Vec<RawRow>) {
        self.sheets.insert(sheet.to_string(), rows);
    }
}

impl SheetSource for MemoryWorkbook {
    fn describe(&self) -> String {
        "in-memory workbook".to_string()
    }

    fn rows(&self, sheet: &str) -> ImportResult<Vec<RawRow>> {
        self.sheets
            .get(sheet)
            .cloned()
            .ok_or_else(|| ImportError::sheet(sheet, "Worksheet not found"))
    }
}

/// Read a whole CSV file into rows
pub fn read_csv_file(path: &Path) -> ImportResult<Vec<RawRow>> {
    let file = std::fs::File::open(path).map_err(|e| {
        ImportError::sheet(path.display().to_string(), format!("cannot open: {}", e))
    })?;
    let rows = read_csv(file)?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read CSV text with a header line into rows
pub fn read_csv<R: Read>(reader: R) -> ImportResult<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(to_row(&headers, &record?));
    }
    Ok(rows)
}

fn to_row(headers: &[String], record: &StringRecord) -> RawRow {
    let mut row = RawRow::new();
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        let cell = record.get(i).map(RawValue::from_cell).unwrap_or(RawValue::Missing);
        row.insert(header.as_str(), cell);
    }
    row
}

/// Left join `right` onto `left` where `left[left_key] == right[right_key]`
///
/// Row order follows `left`. A left row with several matching right rows is
/// emitted once per match, in `right` order; a duplicated key is logged since
/// the line will then be processed more than once. Left columns win on name
/// clashes. Rows with no match keep only their own columns, so later
/// validation sees the joined columns as missing.
pub fn left_join(left: Vec<RawRow>, left_key: &str, right: &[RawRow], right_key: &str) -> Vec<RawRow> {
    let mut index: HashMap<String, Vec<&RawRow>> = HashMap::new();
    for row in right {
        if let Some(key) = row.get(right_key).as_string() {
            index.entry(key).or_default().push(row);
        }
    }
    for (key, matches) in &index {
        if matches.len() > 1 {
            warn!("{} {} appears {} times in the mapping", right_key, key, matches.len());
        }
    }

    let mut joined = Vec::with_capacity(left.len());
    for row in left {
        let matches = row
            .get(left_key)
            .as_string()
            .and_then(|key| index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or_default();

        match matches {
            [] => joined.push(row),
            [only] => {
                let mut row = row;
                row.merge_missing(only);
                joined.push(row);
            }
            many => {
                for matched in many {
                    let mut copy = row.clone();
                    copy.merge_missing(matched);
                    joined.push(copy);
                }
            }
        }
    }
    joined
}
