//! Batch import orchestration
//!
//! One invocation runs inside one store transaction:
//! 1. Schema gate and sheet loading (VALIDATING)
//! 2. Rows reconciled strictly in file order, sheet by sheet (RECONCILING)
//! 3. Commit or roll back on the single "any failure?" signal (DECIDING)
//!
//! A failing row is logged and counted; it never stops the rows after it.

use crate::db::{DetailTable, ImportStore};
use crate::error::{ImportResult, RowError};
use crate::models::{ImportReport, ImportSession, ImportState, SheetReport};
use crate::reconciler::{
    reconcile_analysis, reconcile_run, reconcile_sample, reconcile_speciation, reconcile_specimen,
    reconcile_storage, Reconciled, RowContext,
};
use crate::rows::{RawRow, RunRecord, SampleRecord, SpecimenRecord, StorageRecord, SummaryRecord};
use crate::sheet::{left_join, read_csv_file, SheetSource};
use crate::sync::{sync_details, sync_drug_resistances, sync_spikes, SyncSummary};
use labtrack_common::config::AnalysisConfig;
use labtrack_common::db::{check_schema_version, DetailType};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, error, info};

/// Sheet name used in log lines for the results summary
pub const SUMMARY_SHEET: &str = "Summary";

/// Summary column joined against the mapping file
pub const SUMMARY_JOIN_COLUMN: &str = "Sample ID";

/// Mapping column holding the remote sample name
pub const MAPPING_JOIN_COLUMN: &str = "remote_sample_name";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Process everything, then roll back
    pub dry_run: bool,
    /// Written to created_by / updated_by
    pub audit_user: String,
}

/// Sheets of an upload workbook, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    Runs,
    Specimens,
    Samples,
    Storage,
}

impl Sheet {
    /// Parents before children so every reference resolves
    pub const ORDER: [Sheet; 4] = [Sheet::Runs, Sheet::Specimens, Sheet::Samples, Sheet::Storage];

    pub fn name(&self) -> &'static str {
        match self {
            Sheet::Runs => "Runs",
            Sheet::Specimens => "Specimens",
            Sheet::Samples => "Samples",
            Sheet::Storage => "Storage",
        }
    }

    /// Attribute catalog driving this sheet's detail rows
    pub fn detail_table(&self) -> Option<DetailTable> {
        match self {
            Sheet::Specimens => Some(DetailTable::Specimen),
            Sheet::Samples => Some(DetailTable::Sample),
            Sheet::Runs | Sheet::Storage => None,
        }
    }
}

/// Import a Runs / Specimens / Samples / Storage workbook
///
/// Returns `Err` only for conditions that prevent the import from starting
/// (schema mismatch, no transaction). Everything else ends up in the report.
pub async fn import_workbook<S: SheetSource + ?Sized>(
    pool: &SqlitePool,
    source: &S,
    options: &ImportOptions,
) -> ImportResult<ImportReport> {
    let mut session = ImportSession::new(options.dry_run);
    let mut report = ImportReport::new(options.dry_run);
    info!("Uploading {} (dry run: {})", source.describe(), options.dry_run);

    check_schema_version(pool).await?;

    let mut sheets: Vec<(Sheet, Vec<RawRow>)> = Vec::new();
    for sheet in Sheet::ORDER {
        match source.rows(sheet.name()) {
            Ok(rows) => sheets.push((sheet, rows)),
            Err(e) => {
                error!("{} Sheet : {}", sheet.name(), e);
                report.add_failure(sheet.name(), None, e.to_string());
            }
        }
    }

    let mut store = ImportStore::begin(pool, &options.audit_user).await?;
    session.transition_to(ImportState::Reconciling);

    for (sheet, rows) in &sheets {
        let mut counts = SheetReport::new(sheet.name());

        let catalog = match sheet.detail_table() {
            Some(table) => match store.load_detail_types(table).await {
                Ok(catalog) => catalog,
                Err(e) => {
                    error!("{} Sheet : cannot load {}: {}", sheet.name(), table.type_table(), e);
                    report.add_failure(sheet.name(), None, e.to_string());
                    report.sheets.push(counts);
                    continue;
                }
            },
            None => Vec::new(),
        };

        for (index, raw) in rows.iter().enumerate() {
            if is_blank(raw) {
                continue;
            }
            let ctx = RowContext::new(sheet.name(), index);
            counts.rows += 1;

            let result = reconcile_workbook_row(&mut store, *sheet, ctx, raw, &catalog).await;
            record_row(&mut report, &mut counts, ctx, result);
        }

        debug!(
            sheet = sheet.name(),
            rows = counts.rows,
            inserted = counts.inserted,
            updated = counts.updated,
            failed = counts.failed,
            "Sheet processed"
        );
        report.sheets.push(counts);
    }

    finish(store, session, report).await
}

async fn reconcile_workbook_row(
    store: &mut ImportStore,
    sheet: Sheet,
    ctx: RowContext<'_>,
    raw: &RawRow,
    catalog: &[DetailType],
) -> Result<Reconciled, RowError> {
    match sheet {
        Sheet::Runs => {
            let record = RunRecord::from_row(raw)?;
            let (_, outcome) = reconcile_run(store, ctx, &record).await?;
            Ok(outcome)
        }
        Sheet::Specimens => {
            let record = SpecimenRecord::from_row(raw)?;
            let (specimen, outcome) = reconcile_specimen(store, ctx, &record).await?;
            let specimen_id = saved_id(specimen.id, "Specimen")?;

            let details =
                sync_details(store, DetailTable::Specimen, catalog, specimen_id, &record).await;
            children_ok([details])?;
            Ok(outcome)
        }
        Sheet::Samples => {
            let record = SampleRecord::from_row(raw)?;
            let (sample, outcome) = reconcile_sample(store, ctx, &record).await?;
            let sample_id = saved_id(sample.id, "Sample")?;

            let details = sync_details(store, DetailTable::Sample, catalog, sample_id, &record).await;
            let spikes = sync_spikes(store, sample_id, &record).await;
            children_ok([details, spikes])?;
            Ok(outcome)
        }
        Sheet::Storage => {
            let record = StorageRecord::from_row(raw)?;
            let (_, outcome) = reconcile_storage(store, ctx, &record).await?;
            Ok(outcome)
        }
    }
}

/// Import a results summary joined to its sample mapping file
///
/// Each summary line upserts the (sample, batch) analysis, its primary
/// speciation, the configured per-drug results and catalog-driven extras.
pub async fn import_summary(
    pool: &SqlitePool,
    summary_path: &Path,
    mapping_path: &Path,
    options: &ImportOptions,
    analysis: &AnalysisConfig,
) -> ImportResult<ImportReport> {
    let mut session = ImportSession::new(options.dry_run);
    let mut report = ImportReport::new(options.dry_run);
    info!(
        "Importing summary {} with mapping {} (dry run: {})",
        summary_path.display(),
        mapping_path.display(),
        options.dry_run
    );

    check_schema_version(pool).await?;

    let rows = match read_csv_file(summary_path).and_then(|summary| {
        let mapping = read_csv_file(mapping_path)?;
        Ok(left_join(summary, SUMMARY_JOIN_COLUMN, &mapping, MAPPING_JOIN_COLUMN))
    }) {
        Ok(rows) => rows,
        Err(e) => {
            error!("{} Sheet : {}", SUMMARY_SHEET, e);
            report.add_failure(SUMMARY_SHEET, None, e.to_string());
            Vec::new()
        }
    };

    let mut store = ImportStore::begin(pool, &options.audit_user).await?;
    session.transition_to(ImportState::Reconciling);

    let mut counts = SheetReport::new(SUMMARY_SHEET);
    match store.load_detail_types(DetailTable::Other).await {
        Ok(catalog) => {
            for (index, raw) in rows.iter().enumerate() {
                if is_blank(raw) {
                    continue;
                }
                let ctx = RowContext::new(SUMMARY_SHEET, index);
                counts.rows += 1;

                let result = reconcile_summary_row(&mut store, ctx, raw, &catalog, analysis).await;
                record_row(&mut report, &mut counts, ctx, result);
            }
        }
        Err(e) => {
            error!("{} Sheet : cannot load other_types: {}", SUMMARY_SHEET, e);
            report.add_failure(SUMMARY_SHEET, None, e.to_string());
        }
    }
    report.sheets.push(counts);

    finish(store, session, report).await
}

async fn reconcile_summary_row(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    raw: &RawRow,
    catalog: &[DetailType],
    config: &AnalysisConfig,
) -> Result<Reconciled, RowError> {
    let record = SummaryRecord::from_row(raw)?;
    let (analysis, outcome) = reconcile_analysis(store, ctx, &record, &config.assay_system).await?;
    let analysis_id = saved_id(analysis.id, "Analysis")?;

    reconcile_speciation(store, ctx, analysis_id, &record).await?;

    let drugs = sync_drug_resistances(store, analysis_id, &config.drugs, &record, raw).await;
    let others = sync_details(store, DetailTable::Other, catalog, analysis_id, &record).await;
    children_ok([drugs, others])?;
    Ok(outcome)
}

/// Roll back or commit, then log the verdict
async fn finish(
    store: ImportStore,
    mut session: ImportSession,
    mut report: ImportReport,
) -> ImportResult<ImportReport> {
    session.transition_to(ImportState::Deciding);

    if !report.success() {
        store.rollback().await?;
        session.transition_to(ImportState::RolledBack);
        error!(
            failures = report.failures.len(),
            "Upload failed, please see log messages for details"
        );
    } else if session.dry_run {
        store.rollback().await?;
        session.transition_to(ImportState::RolledBack);
        info!("Dry run mode, no data was uploaded");
    } else {
        store.commit().await?;
        session.transition_to(ImportState::Committed);
        info!("Data uploaded successfully");
    }

    report.state = session.state;
    report.duration_ms = session.elapsed_ms();
    Ok(report)
}

fn record_row(
    report: &mut ImportReport,
    counts: &mut SheetReport,
    ctx: RowContext<'_>,
    result: Result<Reconciled, RowError>,
) {
    match result {
        Ok(outcome) => counts.record(outcome),
        Err(e) => {
            counts.failed += 1;
            for message in e.messages() {
                error!("{} {}", ctx, message);
                report.add_failure(ctx.sheet, Some(ctx.row), message);
            }
        }
    }
}

fn children_ok<const N: usize>(summaries: [SyncSummary; N]) -> Result<(), RowError> {
    let problems: Vec<String> = summaries
        .into_iter()
        .flat_map(|summary| summary.problems)
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(RowError::Children(problems))
    }
}

fn saved_id(id: Option<i64>, entity: &str) -> Result<i64, RowError> {
    id.ok_or_else(|| RowError::Invalid(format!("{} was saved without an id", entity)))
}

/// Spreadsheet exports often end in rows with no content
fn is_blank(raw: &RawRow) -> bool {
    raw.iter().all(|(_, value)| value.is_missing())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_order_puts_parents_first() {
        let names: Vec<&str> = Sheet::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Runs", "Specimens", "Samples", "Storage"]);
        assert_eq!(Sheet::Runs.detail_table(), None);
        assert_eq!(Sheet::Samples.detail_table(), Some(DetailTable::Sample));
    }

    #[test]
    fn test_blank_row_detection() {
        let blank = RawRow::from_pairs([("code", ""), ("site", "NaN")]);
        let filled = RawRow::from_pairs([("code", "R1"), ("site", "")]);
        assert!(is_blank(&blank));
        assert!(!is_blank(&filled));
    }

    #[test]
    fn test_child_problems_fail_the_row() {
        let clean = SyncSummary::default();
        let dirty = SyncSummary {
            problems: vec!["spike_name_1 is missing name".to_string()],
            ..Default::default()
        };

        assert!(children_ok([clean.clone()]).is_ok());
        match children_ok([clean, dirty]) {
            Err(RowError::Children(problems)) => assert_eq!(problems.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}
