//! Dependent-collection synchronization
//!
//! Child rows mirror the current input: a value present in the row is
//! inserted or overwritten, a value absent from the row removes the child.
//! Problems with individual children, including rejected writes, are
//! collected and returned; they never stop the remaining children of the
//! same row from being written.

use crate::db::{DetailTable, ImportStore};
use crate::resolver::require_result_type;
use crate::rows::{ImportRecord, RawRow, SummaryRecord, Value};
use labtrack_common::config::DrugColumn;
use labtrack_common::db::{DetailType, DrugResistance, Spike};
use std::collections::BTreeSet;
use tracing::debug;

const SPIKE_NAME_PREFIX: &str = "spike_name_";
const SPIKE_QUANTITY_PREFIX: &str = "spike_quantity_";
const SPIKE_FIELD_LEN: usize = 20;

/// What one synchronization pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Child-level problems; each one fails the row
    pub problems: Vec<String>,
}

impl SyncSummary {
    fn apply(&mut self, change: Change) {
        match change {
            Change::Inserted => self.inserted += 1,
            Change::Updated => self.updated += 1,
            Change::Deleted => self.deleted += 1,
            Change::Unchanged => {}
        }
    }

    fn problem(&mut self, loc: &str, msg: impl std::fmt::Display) {
        self.problems.push(format!("{} : {}", loc, msg));
    }
}

/// Effect of synchronizing a single child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Inserted,
    Updated,
    Deleted,
    Unchanged,
}

/// Bring the sparse detail rows of one parent in line with `record`
///
/// Every catalog code is looked up on the record by name. The value is
/// coerced to the type the catalog declares and written to that column.
pub async fn sync_details<R: ImportRecord>(
    store: &mut ImportStore,
    table: DetailTable,
    catalog: &[DetailType],
    parent_id: i64,
    record: &R,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    for detail_type in catalog {
        let value = record.get(&detail_type.code);
        match sync_detail(store, table, detail_type, parent_id, value).await {
            Ok(change) => summary.apply(change),
            Err(msg) => summary.problem(&detail_type.code, msg),
        }
    }

    summary
}

async fn sync_detail(
    store: &mut ImportStore,
    table: DetailTable,
    detail_type: &DetailType,
    parent_id: i64,
    value: Option<Value>,
) -> Result<Change, String> {
    let existing = store
        .find_detail(table, parent_id, &detail_type.code)
        .await
        .map_err(|e| e.to_string())?;

    let Some(value) = value else {
        let Some(row) = existing else {
            return Ok(Change::Unchanged);
        };
        store.delete_detail(table, row.id).await.map_err(|e| e.to_string())?;
        debug!(code = %detail_type.code, parent_id, "Removed {} row", table.value_table());
        return Ok(Change::Deleted);
    };

    let coerced = value.coerce(detail_type.value_type)?;

    match existing {
        Some(row) => {
            if row.value.as_ref() != Some(&coerced) {
                store
                    .update_detail(table, row.id, &coerced)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            Ok(Change::Updated)
        }
        None => {
            store
                .insert_detail(table, parent_id, &detail_type.code, &coerced)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Change::Inserted)
        }
    }
}

/// Replace the spike set of a sample with the one described by `record`
///
/// Spikes arrive as numbered column pairs `spike_name_N` / `spike_quantity_N`.
/// A pair with neither value is skipped, a quantity without a name is a
/// problem. Afterwards every spike whose name the row does not mention is
/// deleted.
pub async fn sync_spikes<R: ImportRecord>(
    store: &mut ImportStore,
    sample_id: i64,
    record: &R,
) -> SyncSummary {
    let mut summary = SyncSummary::default();
    let mut keep: Vec<String> = Vec::new();

    for suffix in spike_suffixes(record) {
        let name = record
            .get(&format!("{}{}", SPIKE_NAME_PREFIX, suffix))
            .map(|v| v.to_string());
        let quantity = record
            .get(&format!("{}{}", SPIKE_QUANTITY_PREFIX, suffix))
            .map(|v| v.to_string());

        let name = match (name, &quantity) {
            (None, None) => continue,
            (None, Some(_)) => {
                summary
                    .problems
                    .push(format!("{}{} is missing name", SPIKE_NAME_PREFIX, suffix));
                continue;
            }
            (Some(name), _) => name,
        };

        keep.push(name.clone());

        if let Some(problem) = spike_field_problem(SPIKE_NAME_PREFIX, suffix, Some(&name))
            .or_else(|| spike_field_problem(SPIKE_QUANTITY_PREFIX, suffix, quantity.as_deref()))
        {
            summary.problems.push(problem);
            continue;
        }

        match upsert_spike(store, sample_id, name, quantity).await {
            Ok(change) => summary.apply(change),
            Err(e) => summary.problem(&format!("{}{}", SPIKE_NAME_PREFIX, suffix), e),
        }
    }

    match store.delete_spikes_except(sample_id, &keep).await {
        Ok(removed) => {
            summary.deleted += removed as usize;
            if removed > 0 {
                debug!(sample_id, removed, "Removed spikes no longer listed");
            }
        }
        Err(e) => summary.problem("spikes", e),
    }

    summary
}

async fn upsert_spike(
    store: &mut ImportStore,
    sample_id: i64,
    name: String,
    quantity: Option<String>,
) -> Result<Change, sqlx::Error> {
    match store.find_spike(sample_id, &name).await? {
        Some(mut spike) => {
            if spike.quantity != quantity {
                spike.quantity = quantity;
                store.save_spike(&mut spike).await?;
            }
            Ok(Change::Updated)
        }
        None => {
            let mut spike = Spike {
                id: None,
                sample_id,
                name,
                quantity,
            };
            store.save_spike(&mut spike).await?;
            Ok(Change::Inserted)
        }
    }
}

/// Numeric suffixes of every spike column on the record, ascending
fn spike_suffixes<R: ImportRecord>(record: &R) -> BTreeSet<u32> {
    record
        .extras()
        .keys()
        .filter_map(|column| {
            column
                .strip_prefix(SPIKE_NAME_PREFIX)
                .or_else(|| column.strip_prefix(SPIKE_QUANTITY_PREFIX))
        })
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .collect()
}

fn spike_field_problem(prefix: &str, suffix: u32, value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if v.chars().count() > SPIKE_FIELD_LEN => Some(format!(
            "{}{} : String should have at most {} characters",
            prefix, suffix, SPIKE_FIELD_LEN
        )),
        _ => None,
    }
}

/// Mirror per-antibiotic result columns of a summary line
///
/// Only configured columns that exist in the input are considered. A blank
/// cell removes the stored result; a code must be one of the known result
/// types.
pub async fn sync_drug_resistances(
    store: &mut ImportStore,
    analysis_id: i64,
    drugs: &[DrugColumn],
    record: &SummaryRecord,
    raw: &RawRow,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    for drug in drugs.iter().filter(|d| raw.contains(&d.column)) {
        match sync_drug_resistance(store, analysis_id, drug, record.get(&drug.column)).await {
            Ok(change) => summary.apply(change),
            Err(msg) => summary.problem(&drug.column, msg),
        }
    }

    summary
}

async fn sync_drug_resistance(
    store: &mut ImportStore,
    analysis_id: i64,
    drug: &DrugColumn,
    value: Option<Value>,
) -> Result<Change, String> {
    let existing = store
        .find_drug_resistance(analysis_id, &drug.antibiotic)
        .await
        .map_err(|e| e.to_string())?;

    let Some(value) = value else {
        let Some(id) = existing.and_then(|result| result.id) else {
            return Ok(Change::Unchanged);
        };
        store.delete_drug_resistance(id).await.map_err(|e| e.to_string())?;
        debug!(analysis_id, antibiotic = %drug.antibiotic, "Removed drug resistance result");
        return Ok(Change::Deleted);
    };

    let code = value.to_string().trim().to_ascii_uppercase();
    if code.chars().count() != 1 {
        return Err(format!("result '{}' should be a single character", code));
    }
    require_result_type(store, &code).await.map_err(|e| e.to_string())?;

    match existing {
        Some(mut result) => {
            if result.drug_resistance_result_type_code != code {
                result.drug_resistance_result_type_code = code;
                store
                    .save_drug_resistance(&mut result)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            Ok(Change::Updated)
        }
        None => {
            let mut result = DrugResistance {
                id: None,
                analysis_id,
                antibiotic: drug.antibiotic.clone(),
                drug_resistance_result_type_code: code,
            };
            store
                .save_drug_resistance(&mut result)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Change::Inserted)
        }
    }
}
