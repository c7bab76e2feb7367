//! Entity reconciliation: natural-key upsert of one validated record
//!
//! Each `reconcile_*` looks the entity up by its natural key, copies every
//! record field onto it (or onto a fresh entity), attaches resolved parents
//! and saves it inside the import transaction. Log lines are identical for
//! dry runs and real runs.

use crate::db::ImportStore;
use crate::error::RowError;
use crate::resolver::{require_country, require_run, require_sample, require_specimen};
use crate::rows::{RunRecord, SampleRecord, SpecimenRecord, StorageRecord, SummaryRecord};
use labtrack_common::db::{Analysis, Owner, Run, Sample, Specimen, Speciation, Storage};
use std::fmt;
use tracing::info;

/// Species slot written by the summary import
pub const PRIMARY_SPECIES_NUMBER: i64 = 1;

/// Where a row came from, for log lines
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub sheet: &'a str,
    /// Spreadsheet row number (header is row 1)
    pub row: usize,
}

impl<'a> RowContext<'a> {
    /// Context for the data row at zero-based `index`
    pub fn new(sheet: &'a str, index: usize) -> Self {
        Self {
            sheet,
            row: index + 2,
        }
    }
}

impl fmt::Display for RowContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Sheet Row {}", self.sheet, self.row)
    }
}

/// Whether reconciliation created or updated the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Updated,
}

fn log_outcome(ctx: RowContext<'_>, what: fmt::Arguments<'_>, existed: bool) -> Reconciled {
    if existed {
        info!("{}: {} already exists, updating", ctx, what);
        Reconciled::Updated
    } else {
        info!("{}: {} does not exist, adding", ctx, what);
        Reconciled::Inserted
    }
}

pub async fn reconcile_run(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    record: &RunRecord,
) -> Result<(Run, Reconciled), RowError> {
    let existing = store.find_run(&record.code).await?;
    let outcome = log_outcome(ctx, format_args!("Run {}", record.code), existing.is_some());

    let mut run = merge_run(existing.and_then(|r| r.id), record);
    store.save_run(&mut run).await?;
    Ok((run, outcome))
}

fn merge_run(id: Option<i64>, record: &RunRecord) -> Run {
    Run {
        id,
        code: record.code.clone(),
        run_date: record.run_date,
        site: record.site.clone(),
        sequencing_method: record.sequencing_method,
        machine: record.machine.clone(),
        user: record.user.clone(),
        number_samples: record.number_samples,
        flowcell: record.flowcell.clone(),
        passed_qc: record.passed_qc,
        comment: record.comment.clone(),
    }
}

/// Resolve the (site, user) owner, creating it on first sight
pub async fn reconcile_owner(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    site: &str,
    user: &str,
) -> Result<Owner, RowError> {
    if let Some(owner) = store.find_owner(site, user).await? {
        return Ok(owner);
    }

    info!("{}: Owner {}, {} does not exist, adding", ctx, site, user);
    let mut owner = Owner {
        id: None,
        site: site.to_string(),
        user: user.to_string(),
    };
    store.insert_owner(&mut owner).await?;
    Ok(owner)
}

pub async fn reconcile_specimen(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    record: &SpecimenRecord,
) -> Result<(Specimen, Reconciled), RowError> {
    let country = require_country(store, &record.country_sample_taken_code).await?;
    let owner = reconcile_owner(store, ctx, &record.owner_site, &record.owner_user).await?;
    let owner_id = owner
        .id
        .ok_or_else(|| RowError::Invalid(format!("Owner {}, {} has no id", owner.site, owner.user)))?;

    let existing = store
        .find_specimen(&record.accession, record.collection_date)
        .await?;
    let outcome = log_outcome(
        ctx,
        format_args!("Specimen {}, {}", record.accession, record.collection_date),
        existing.is_some(),
    );

    let mut specimen = Specimen {
        id: existing.and_then(|s| s.id),
        owner_id,
        accession: record.accession.clone(),
        collection_date: record.collection_date,
        country_sample_taken_code: country.code,
        specimen_type: record.specimen_type.clone(),
        specimen_qr_code: record.specimen_qr_code.clone(),
        bar_code: record.bar_code.clone(),
    };
    store.save_specimen(&mut specimen).await?;
    Ok((specimen, outcome))
}

pub async fn reconcile_sample(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    record: &SampleRecord,
) -> Result<(Sample, Reconciled), RowError> {
    let run = require_run(store, &record.run_code).await?;
    let specimen = require_specimen(store, &record.accession, record.collection_date).await?;
    let (Some(run_id), Some(specimen_id)) = (run.id, specimen.id) else {
        return Err(RowError::Invalid(format!(
            "Sample {} references an unsaved run or specimen",
            record.guid
        )));
    };

    let existing = store.find_sample(&record.guid).await?;
    let outcome = log_outcome(ctx, format_args!("Sample {}", record.guid), existing.is_some());

    let mut sample = Sample {
        id: existing.and_then(|s| s.id),
        specimen_id,
        run_id,
        guid: record.guid.clone(),
        sample_category: record.sample_category,
        nucleic_acid_type: record.nucleic_acid_type.clone(),
    };
    store.save_sample(&mut sample).await?;
    Ok((sample, outcome))
}

pub async fn reconcile_storage(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    record: &StorageRecord,
) -> Result<(Storage, Reconciled), RowError> {
    let specimen = require_specimen(store, &record.accession, record.collection_date).await?;
    let specimen_id = specimen.id.ok_or_else(|| {
        RowError::Invalid(format!("Specimen {} has no id", record.accession))
    })?;

    let existing = store.find_storage(&record.storage_qr_code).await?;
    let outcome = log_outcome(
        ctx,
        format_args!("Storage {}", record.storage_qr_code),
        existing.is_some(),
    );

    let mut storage = Storage {
        id: existing.and_then(|s| s.id),
        specimen_id,
        freezer: record.freezer.clone(),
        shelf: record.shelf.clone(),
        rack: record.rack.clone(),
        tray: record.tray.clone(),
        box_: record.box_.clone(),
        box_location: record.box_location.clone(),
        storage_qr_code: record.storage_qr_code.clone(),
        date_into_storage: record.date_into_storage,
        notes: record.notes.clone(),
    };
    store.save_storage(&mut storage).await?;
    Ok((storage, outcome))
}

/// Upsert the (sample, batch) analysis a summary line reports on
pub async fn reconcile_analysis(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    record: &SummaryRecord,
    assay_system: &str,
) -> Result<(Analysis, Reconciled), RowError> {
    let sample = require_sample(store, &record.sample_name).await?;
    let sample_id = sample
        .id
        .ok_or_else(|| RowError::Invalid(format!("Sample {} has no id", record.sample_name)))?;

    let existing = store.find_analysis(sample_id, &record.batch).await?;
    let outcome = log_outcome(
        ctx,
        format_args!("Batch {}, Sample {}", record.batch, record.sample_name),
        existing.is_some(),
    );

    let mut analysis = Analysis {
        id: existing.and_then(|a| a.id),
        sample_id,
        batch_name: record.batch.clone(),
        assay_system: assay_system.to_string(),
    };
    store.save_analysis(&mut analysis).await?;
    Ok((analysis, outcome))
}

/// Upsert the primary speciation; `None` when the line names no species
pub async fn reconcile_speciation(
    store: &mut ImportStore,
    ctx: RowContext<'_>,
    analysis_id: i64,
    record: &SummaryRecord,
) -> Result<Option<(Speciation, Reconciled)>, RowError> {
    let Some(species) = record.species.clone() else {
        info!(
            "{}: Speciation for Batch {}, Sample {} not found",
            ctx, record.batch, record.sample_name
        );
        return Ok(None);
    };

    let existing = store
        .find_speciation(analysis_id, PRIMARY_SPECIES_NUMBER)
        .await?;
    let outcome = log_outcome(
        ctx,
        format_args!(
            "Speciation for Batch {}, Sample {}",
            record.batch, record.sample_name
        ),
        existing.is_some(),
    );

    let mut speciation = Speciation {
        id: existing.and_then(|s| s.id),
        analysis_id,
        species_number: PRIMARY_SPECIES_NUMBER,
        species,
        sub_species: record.sub_species.clone(),
        analysis_date: record.run_date,
    };
    store.save_speciation(&mut speciation).await?;
    Ok(Some((speciation, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::RawRow;
    use labtrack_common::db::init_memory_database;

    fn run_record(machine: &str) -> RunRecord {
        RunRecord::from_row(&RawRow::from_pairs([
            ("code", "RUN-1"),
            ("run_date", "2021-02-03"),
            ("site", "Oxford"),
            ("sequencing_method", "ont"),
            ("machine", machine),
        ]))
        .unwrap()
    }

    #[test]
    fn test_row_context_numbering() {
        let ctx = RowContext::new("Runs", 0);
        assert_eq!(ctx.to_string(), "Runs Sheet Row 2");
    }

    #[tokio::test]
    async fn test_run_upsert_keeps_id() {
        let pool = init_memory_database().await.unwrap();
        let mut store = ImportStore::begin(&pool, "tester").await.unwrap();
        let ctx = RowContext::new("Runs", 0);

        let (first, outcome) = reconcile_run(&mut store, ctx, &run_record("MinION")).await.unwrap();
        assert_eq!(outcome, Reconciled::Inserted);

        let (second, outcome) = reconcile_run(&mut store, ctx, &run_record("GridION")).await.unwrap();
        assert_eq!(outcome, Reconciled::Updated);
        assert_eq!(first.id, second.id);

        let stored = store.find_run("RUN-1").await.unwrap().unwrap();
        assert_eq!(stored.machine, "GridION");
    }

    #[tokio::test]
    async fn test_owner_created_once() {
        let pool = init_memory_database().await.unwrap();
        let mut store = ImportStore::begin(&pool, "tester").await.unwrap();
        let ctx = RowContext::new("Specimens", 3);

        let a = reconcile_owner(&mut store, ctx, "SiteA", "User1").await.unwrap();
        let b = reconcile_owner(&mut store, ctx, "SiteA", "User1").await.unwrap();
        assert_eq!(a.id, b.id);
    }
}
