//! Natural-key resolution of required references
//!
//! A dependent row cannot be reconciled without its parents. These lookups
//! turn "no such parent" into a [`RowError::NotFound`] for that row instead
//! of a failure of the whole import.

use crate::db::ImportStore;
use crate::error::RowError;
use chrono::NaiveDate;
use labtrack_common::db::{Country, DrugResistanceResultType, Run, Sample, Specimen};

pub async fn require_run(store: &mut ImportStore, code: &str) -> Result<Run, RowError> {
    store
        .find_run(code)
        .await?
        .ok_or_else(|| RowError::NotFound(format!("Run {} does not exist", code)))
}

pub async fn require_specimen(
    store: &mut ImportStore,
    accession: &str,
    collection_date: NaiveDate,
) -> Result<Specimen, RowError> {
    store
        .find_specimen(accession, collection_date)
        .await?
        .ok_or_else(|| {
            RowError::NotFound(format!(
                "Specimen {}, {} does not exist",
                accession, collection_date
            ))
        })
}

pub async fn require_sample(store: &mut ImportStore, guid: &str) -> Result<Sample, RowError> {
    store
        .find_sample(guid)
        .await?
        .ok_or_else(|| RowError::NotFound(format!("Sample {} does not exist", guid)))
}

pub async fn require_country(store: &mut ImportStore, code: &str) -> Result<Country, RowError> {
    store
        .find_country(code)
        .await?
        .ok_or_else(|| RowError::NotFound(format!("Country {} does not exist", code)))
}

pub async fn require_result_type(
    store: &mut ImportStore,
    code: &str,
) -> Result<DrugResistanceResultType, RowError> {
    store.find_result_type(code).await?.ok_or_else(|| {
        RowError::NotFound(format!("Drug resistance result {} does not exist", code))
    })
}
