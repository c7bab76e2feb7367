//! Row and workbook builders

use labtrack_import::rows::RawRow;
use labtrack_import::sheet::MemoryWorkbook;
use labtrack_import::Sheet;

pub fn run_row(code: &str) -> RawRow {
    RawRow::from_pairs([
        ("code", code),
        ("run_date", "2021-02-01"),
        ("site", "Oxford"),
        ("sequencing_method", "illumina"),
        ("machine", "MiSeq"),
    ])
}

pub fn specimen_row(accession: &str, collection_date: &str) -> RawRow {
    RawRow::from_pairs([
        ("owner_site", "SiteA"),
        ("owner_user", "User1"),
        ("accession", accession),
        ("collection_date", collection_date),
        ("country_sample_taken_code", "GBR"),
    ])
}

pub fn sample_row(guid: &str, run_code: &str, accession: &str, collection_date: &str) -> RawRow {
    RawRow::from_pairs([
        ("run_code", run_code),
        ("accession", accession),
        ("collection_date", collection_date),
        ("guid", guid),
    ])
}

pub fn storage_row(qr: &str, accession: &str, collection_date: &str) -> RawRow {
    RawRow::from_pairs([
        ("accession", accession),
        ("collection_date", collection_date),
        ("freezer", "F1"),
        ("shelf", "S2"),
        ("rack", "R3"),
        ("tray", "T4"),
        ("box", "B5"),
        ("box_location", "A1"),
        ("storage_qr_code", qr),
        ("date_into_storage", "2021-03-01"),
    ])
}

/// Workbook with every sheet present; sheets not listed are empty
pub fn workbook_with(sheets: Vec<(Sheet, Vec<RawRow>)>) -> MemoryWorkbook {
    let mut workbook = MemoryWorkbook::new();
    for sheet in Sheet::ORDER {
        workbook.insert_sheet(sheet.name(), Vec::new());
    }
    for (sheet, rows) in sheets {
        workbook.insert_sheet(sheet.name(), rows);
    }
    workbook
}
