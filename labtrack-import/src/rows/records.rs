//! Typed records, one per sheet
//!
//! Each record is built from a [`RawRow`] by `from_row`, which reports all
//! field failures at once. Declared attributes are available by name through
//! [`ImportRecord::field`] so catalog-driven attributes can be looked up by
//! their code at runtime.

use crate::error::{FieldError, ValidationErrors};
use crate::rows::reader::{Extras, RowReader};
use crate::rows::value::{RawRow, Value};
use chrono::NaiveDate;
use labtrack_common::vocabulary::{NucleicAcidType, SampleCategory, SequencingMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const CODE_LEN: usize = 20;
const NAME_LEN: usize = 50;
const GUID_LEN: usize = 64;

/// Lookup by attribute name on a validated record
pub trait ImportRecord {
    /// Declared attribute; `None` when absent or not declared
    fn field(&self, name: &str) -> Option<Value>;

    /// Columns the record does not declare
    fn extras(&self) -> &Extras;

    /// Declared attribute first, then extras; `None` for unknown names
    fn get(&self, name: &str) -> Option<Value> {
        self.field(name)
            .or_else(|| self.extras().get(name).cloned())
    }
}

fn opt<T: Into<Value> + Clone>(value: &Option<T>) -> Option<Value> {
    value.clone().map(Into::into)
}

/// Unreachable once `finish` succeeded; keeps construction free of panics
fn incomplete() -> ValidationErrors {
    FieldError::new("row", "Row is incomplete").into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
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
    pub extras: Extras,
}

impl RunRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, ValidationErrors> {
        let mut r = RowReader::new(row);
        let code = r.required_str("code", CODE_LEN);
        let run_date = r.required_date("run_date");
        let site = r.required_str("site", CODE_LEN);
        let sequencing_method = r.required_vocab::<SequencingMethod>("sequencing_method");
        let machine = r.required_str("machine", CODE_LEN);
        let user = r.optional_str("user", 5);
        let number_samples = r.optional_positive_int("number_samples");
        let flowcell = r.optional_str("flowcell", CODE_LEN);
        let passed_qc = r.optional_bool("passed_qc");
        let comment = r.optional_text("comment");
        let extras = r.finish()?;

        let (Some(code), Some(run_date), Some(site), Some(sequencing_method), Some(machine)) =
            (code, run_date, site, sequencing_method, machine)
        else {
            return Err(incomplete());
        };

        Ok(Self {
            code,
            run_date,
            site,
            sequencing_method,
            machine,
            user,
            number_samples,
            flowcell,
            passed_qc,
            comment,
            extras,
        })
    }
}

impl ImportRecord for RunRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "code" => Some(self.code.clone().into()),
            "run_date" => Some(self.run_date.into()),
            "site" => Some(self.site.clone().into()),
            "sequencing_method" => Some(self.sequencing_method.as_str().into()),
            "machine" => Some(self.machine.clone().into()),
            "user" => opt(&self.user),
            "number_samples" => opt(&self.number_samples),
            "flowcell" => opt(&self.flowcell),
            "passed_qc" => opt(&self.passed_qc),
            "comment" => opt(&self.comment),
            _ => None,
        }
    }

    fn extras(&self) -> &Extras {
        &self.extras
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecimenRecord {
    pub owner_site: String,
    pub owner_user: String,
    pub accession: String,
    pub collection_date: NaiveDate,
    pub country_sample_taken_code: String,
    pub specimen_type: Option<String>,
    pub specimen_qr_code: Option<String>,
    pub bar_code: Option<String>,
    pub organism: Option<String>,
    pub host: Option<String>,
    pub host_diseases: Option<String>,
    pub isolation_source: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub extras: Extras,
}

impl SpecimenRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, ValidationErrors> {
        let mut r = RowReader::new(row);
        let owner_site = r.required_str("owner_site", NAME_LEN);
        let owner_user = r.required_str("owner_user", NAME_LEN);
        let accession = r.required_str("accession", CODE_LEN);
        let collection_date = r.required_date("collection_date");
        let country = r.required_country_code("country_sample_taken_code");
        let specimen_type = r.optional_str("specimen_type", NAME_LEN);
        let specimen_qr_code = r.optional_text("specimen_qr_code");
        let bar_code = r.optional_text("bar_code");
        let organism = r.optional_str("organism", NAME_LEN);
        let host = r.optional_str("host", NAME_LEN);
        let host_diseases = r.optional_str("host_diseases", NAME_LEN);
        let isolation_source = r.optional_str("isolation_source", NAME_LEN);
        let lat = r.optional_float("lat");
        let lon = r.optional_float("lon");
        let extras = r.finish()?;

        let (Some(owner_site), Some(owner_user), Some(accession), Some(collection_date), Some(country)) =
            (owner_site, owner_user, accession, collection_date, country)
        else {
            return Err(incomplete());
        };

        Ok(Self {
            owner_site,
            owner_user,
            accession,
            collection_date,
            country_sample_taken_code: country,
            specimen_type,
            specimen_qr_code,
            bar_code,
            organism,
            host,
            host_diseases,
            isolation_source,
            lat,
            lon,
            extras,
        })
    }
}

impl ImportRecord for SpecimenRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "owner_site" => Some(self.owner_site.clone().into()),
            "owner_user" => Some(self.owner_user.clone().into()),
            "accession" => Some(self.accession.clone().into()),
            "collection_date" => Some(self.collection_date.into()),
            "country_sample_taken_code" => Some(self.country_sample_taken_code.clone().into()),
            "specimen_type" => opt(&self.specimen_type),
            "specimen_qr_code" => opt(&self.specimen_qr_code),
            "bar_code" => opt(&self.bar_code),
            "organism" => opt(&self.organism),
            "host" => opt(&self.host),
            "host_diseases" => opt(&self.host_diseases),
            "isolation_source" => opt(&self.isolation_source),
            "lat" => opt(&self.lat),
            "lon" => opt(&self.lon),
            _ => None,
        }
    }

    fn extras(&self) -> &Extras {
        &self.extras
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub run_code: String,
    pub accession: String,
    pub collection_date: NaiveDate,
    pub guid: String,
    pub sample_category: Option<SampleCategory>,
    pub nucleic_acid_type: BTreeSet<NucleicAcidType>,
    pub dilution_post_initial_concentration: Option<bool>,
    pub extraction_date: Option<NaiveDate>,
    pub extraction_method: Option<String>,
    pub extraction_protocol: Option<String>,
    pub extraction_user: Option<String>,
    pub illumina_index: Option<String>,
    pub input_volume: Option<f64>,
    pub library_pool_concentration: Option<f64>,
    pub ont_barcode: Option<String>,
    pub dna_amplification: Option<bool>,
    pub pre_sequence_concentration: Option<f64>,
    pub prep_kit: Option<String>,
    pub comment: Option<String>,
    pub extras: Extras,
}

impl SampleRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, ValidationErrors> {
        let mut r = RowReader::new(row);
        let run_code = r.required_str("run_code", CODE_LEN);
        let accession = r.required_str("accession", CODE_LEN);
        let collection_date = r.required_date("collection_date");
        let guid = r.required_str("guid", GUID_LEN);
        let sample_category = r.optional_vocab::<SampleCategory>("sample_category");
        let nucleic_acid_type = r.optional_vocab_set::<NucleicAcidType>("nucleic_acid_type");
        let dilution_post_initial_concentration =
            r.optional_bool("dilution_post_initial_concentration");
        let extraction_date = r.optional_date("extraction_date");
        let extraction_method = r.optional_str("extraction_method", NAME_LEN);
        let extraction_protocol = r.optional_str("extraction_protocol", NAME_LEN);
        let extraction_user = r.optional_str("extraction_user", NAME_LEN);
        let illumina_index = r.optional_str("illumina_index", NAME_LEN);
        let input_volume = r.optional_float("input_volume");
        let library_pool_concentration = r.optional_float("library_pool_concentration");
        let ont_barcode = r.optional_str("ont_barcode", NAME_LEN);
        let dna_amplification = r.optional_bool("dna_amplification");
        let pre_sequence_concentration = r.optional_float("pre_sequence_concentration");
        let prep_kit = r.optional_str("prep_kit", NAME_LEN);
        let comment = r.optional_text("comment");
        let extras = r.finish()?;

        let (Some(run_code), Some(accession), Some(collection_date), Some(guid)) =
            (run_code, accession, collection_date, guid)
        else {
            return Err(incomplete());
        };

        Ok(Self {
            run_code,
            accession,
            collection_date,
            guid,
            sample_category,
            nucleic_acid_type,
            dilution_post_initial_concentration,
            extraction_date,
            extraction_method,
            extraction_protocol,
            extraction_user,
            illumina_index,
            input_volume,
            library_pool_concentration,
            ont_barcode,
            dna_amplification,
            pre_sequence_concentration,
            prep_kit,
            comment,
            extras,
        })
    }
}

impl ImportRecord for SampleRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "run_code" => Some(self.run_code.clone().into()),
            "accession" => Some(self.accession.clone().into()),
            "collection_date" => Some(self.collection_date.into()),
            "guid" => Some(self.guid.clone().into()),
            "sample_category" => self.sample_category.map(|c| c.as_str().into()),
            "nucleic_acid_type" if !self.nucleic_acid_type.is_empty() => {
                let joined: Vec<&str> = self.nucleic_acid_type.iter().map(|t| t.as_str()).collect();
                Some(joined.join(",").into())
            }
            "dilution_post_initial_concentration" => opt(&self.dilution_post_initial_concentration),
            "extraction_date" => opt(&self.extraction_date),
            "extraction_method" => opt(&self.extraction_method),
            "extraction_protocol" => opt(&self.extraction_protocol),
            "extraction_user" => opt(&self.extraction_user),
            "illumina_index" => opt(&self.illumina_index),
            "input_volume" => opt(&self.input_volume),
            "library_pool_concentration" => opt(&self.library_pool_concentration),
            "ont_barcode" => opt(&self.ont_barcode),
            "dna_amplification" => opt(&self.dna_amplification),
            "pre_sequence_concentration" => opt(&self.pre_sequence_concentration),
            "prep_kit" => opt(&self.prep_kit),
            "comment" => opt(&self.comment),
            _ => None,
        }
    }

    fn extras(&self) -> &Extras {
        &self.extras
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub accession: String,
    pub collection_date: NaiveDate,
    pub freezer: String,
    pub shelf: String,
    pub rack: String,
    pub tray: String,
    pub box_: String,
    pub box_location: String,
    pub storage_qr_code: String,
    pub date_into_storage: NaiveDate,
    pub notes: Option<String>,
    pub extras: Extras,
}

impl StorageRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, ValidationErrors> {
        let mut r = RowReader::new(row);
        let accession = r.required_str("accession", CODE_LEN);
        let collection_date = r.required_date("collection_date");
        let freezer = r.required_str("freezer", NAME_LEN);
        let shelf = r.required_str("shelf", NAME_LEN);
        let rack = r.required_str("rack", NAME_LEN);
        let tray = r.required_str("tray", NAME_LEN);
        let box_ = r.required_str("box", NAME_LEN);
        let box_location = r.required_str("box_location", NAME_LEN);
        let storage_qr_code = r.required_text("storage_qr_code");
        let date_into_storage = r.required_date("date_into_storage");
        let notes = r.optional_text("notes");
        let extras = r.finish()?;

        let (
            Some(accession),
            Some(collection_date),
            Some(freezer),
            Some(shelf),
            Some(rack),
            Some(tray),
            Some(box_),
            Some(box_location),
            Some(storage_qr_code),
            Some(date_into_storage),
        ) = (
            accession,
            collection_date,
            freezer,
            shelf,
            rack,
            tray,
            box_,
            box_location,
            storage_qr_code,
            date_into_storage,
        )
        else {
            return Err(incomplete());
        };

        Ok(Self {
            accession,
            collection_date,
            freezer,
            shelf,
            rack,
            tray,
            box_,
            box_location,
            storage_qr_code,
            date_into_storage,
            notes,
            extras,
        })
    }
}

impl ImportRecord for StorageRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "accession" => Some(self.accession.clone().into()),
            "collection_date" => Some(self.collection_date.into()),
            "freezer" => Some(self.freezer.clone().into()),
            "shelf" => Some(self.shelf.clone().into()),
            "rack" => Some(self.rack.clone().into()),
            "tray" => Some(self.tray.clone().into()),
            "box" => Some(self.box_.clone().into()),
            "box_location" => Some(self.box_location.clone().into()),
            "storage_qr_code" => Some(self.storage_qr_code.clone().into()),
            "date_into_storage" => Some(self.date_into_storage.into()),
            "notes" => opt(&self.notes),
            _ => None,
        }
    }

    fn extras(&self) -> &Extras {
        &self.extras
    }
}

/// One line of a results summary joined to the sample mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Local sample guid from the mapping file
    pub sample_name: String,
    pub batch: String,
    pub main_species: Option<String>,
    pub species: Option<String>,
    pub sub_species: Option<String>,
    pub run_date: Option<NaiveDate>,
    pub extras: Extras,
}

impl SummaryRecord {
    pub fn from_row(row: &RawRow) -> Result<Self, ValidationErrors> {
        let mut r = RowReader::new(row);
        let sample_name = if row.get("sample_name").is_missing() {
            r.error("sample_name", "Sample name not found in mapping file");
            None
        } else {
            r.required_str("sample_name", GUID_LEN)
        };
        let batch = r.required_str("Batch", CODE_LEN);
        let main_species = r.optional_str("Main Species", NAME_LEN);
        let run_date = r.optional_date("Run Date");
        let extras = r.finish()?;

        let (Some(sample_name), Some(batch)) = (sample_name, batch) else {
            return Err(incomplete());
        };

        let (species, sub_species) = match &main_species {
            Some(main) => match main.split_once(' ') {
                Some((species, rest)) => (Some(species.to_string()), Some(rest.trim().to_string())),
                None => (Some(main.clone()), None),
            },
            None => (None, None),
        };

        Ok(Self {
            sample_name,
            batch,
            main_species,
            species,
            sub_species: sub_species.filter(|s| !s.is_empty()),
            run_date,
            extras,
        })
    }
}

impl ImportRecord for SummaryRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "sample_name" => Some(self.sample_name.clone().into()),
            "batch" | "Batch" => Some(self.batch.clone().into()),
            "main_species" | "Main Species" => opt(&self.main_species),
            "species" => opt(&self.species),
            "sub_species" => opt(&self.sub_species),
            "run_date" | "Run Date" => opt(&self.run_date),
            _ => None,
        }
    }

    fn extras(&self) -> &Extras {
        &self.extras
    }
}
