//! Database models
//!
//! Entities carry `id: Option<i64>`; `None` means the row has not been
//! inserted yet. Audit columns are maintained by the store and are not
//! part of these structs.

use crate::vocabulary::{NucleicAcidType, SampleCategory, SequencingMethod, ValueType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Option<i64>,
    pub site: String,
    pub user: String,
}

/// ISO-3166 alpha-3 reference row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub code2: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specimen {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub accession: String,
    pub collection_date: NaiveDate,
    pub country_sample_taken_code: String,
    pub specimen_type: Option<String>,
    pub specimen_qr_code: Option<String>,
    pub bar_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Option<i64>,
    pub code: String,
    pub run_date: NaiveDate,
    pub site: String,
    pub sequencing_method: SequencingMethod,
    pub machine: String,
    pub user: Option<String>,
    pub number_samples: Option<i64>,
    pub flowcell: Option<String>,
    pub passed_qc: Option<bool>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Option<i64>,
    pub specimen_id: i64,
    pub run_id: i64,
    pub guid: String,
    pub sample_category: Option<SampleCategory>,
    /// Stored as a JSON array; empty when not supplied
    pub nucleic_acid_type: BTreeSet<NucleicAcidType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub id: Option<i64>,
    pub sample_id: i64,
    pub name: String,
    pub quantity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: Option<i64>,
    pub specimen_id: i64,
    pub freezer: String,
    pub shelf: String,
    pub rack: String,
    pub tray: String,
    #[serde(rename = "box")]
    pub box_: String,
    pub box_location: String,
    pub storage_qr_code: String,
    pub date_into_storage: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Option<i64>,
    pub sample_id: i64,
    pub batch_name: String,
    pub assay_system: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speciation {
    pub id: Option<i64>,
    pub analysis_id: i64,
    pub species_number: i64,
    pub species: String,
    pub sub_species: Option<String>,
    pub analysis_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResistance {
    pub id: Option<i64>,
    pub analysis_id: i64,
    pub antibiotic: String,
    pub drug_resistance_result_type_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResistanceResultType {
    pub code: String,
    pub description: Option<String>,
}

/// Catalog row describing one permissible attribute
///
/// Shared shape of specimen_detail_types, sample_detail_types and other_types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailType {
    pub code: String,
    pub description: Option<String>,
    pub value_type: ValueType,
}

/// Value held by a sparse detail row, tagged by the column it lives in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum DetailValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
}

impl DetailValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            DetailValue::Str(_) => ValueType::Str,
            DetailValue::Int(_) => ValueType::Int,
            DetailValue::Float(_) => ValueType::Float,
            DetailValue::Bool(_) => ValueType::Bool,
            DetailValue::Date(_) => ValueType::Date,
            DetailValue::Text(_) => ValueType::Text,
        }
    }
}

/// Persisted detail row (specimen_details, sample_details or others)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub id: i64,
    pub parent_id: i64,
    pub type_code: String,
    /// `None` only if every value column is NULL
    pub value: Option<DetailValue>,
}
