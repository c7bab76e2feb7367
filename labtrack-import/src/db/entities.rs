//! Natural-key lookups and saves for the top-level entities
//!
//! `find_*` never writes. `save_*` inserts when the entity has no id yet
//! (filling it in) and updates by id otherwise.

use super::{decode_error, ImportStore};
use chrono::NaiveDate;
use labtrack_common::db::{Country, Owner, Run, Sample, Specimen, Storage};
use labtrack_common::vocabulary::{NucleicAcidType, SampleCategory, SequencingMethod};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeSet;

impl ImportStore {
    pub async fn find_owner(&mut self, site: &str, user: &str) -> Result<Option<Owner>, sqlx::Error> {
        let row = sqlx::query("SELECT id, site, user FROM owners WHERE site = ? AND user = ?")
            .bind(site)
            .bind(user)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(|row| -> Result<Owner, sqlx::Error> {
            Ok(Owner {
                id: Some(row.try_get("id")?),
                site: row.try_get("site")?,
                user: row.try_get("user")?,
            })
        })
        .transpose()
    }

    /// Owners are only ever created, never changed
    pub async fn insert_owner(&mut self, owner: &mut Owner) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();
        let id = sqlx::query(
            r#"
            INSERT INTO owners (site, user, created_by, updated_by)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&owner.site)
        .bind(&owner.user)
        .bind(&audit_user)
        .bind(&audit_user)
        .execute(self.conn()?)
        .await?
        .last_insert_rowid();

        owner.id = Some(id);
        Ok(id)
    }

    pub async fn find_country(&mut self, code: &str) -> Result<Option<Country>, sqlx::Error> {
        let row = sqlx::query("SELECT code, code2, name, lat, lon FROM countries WHERE code = ?")
            .bind(code)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(|row| -> Result<Country, sqlx::Error> {
            Ok(Country {
                code: row.try_get("code")?,
                code2: row.try_get("code2")?,
                name: row.try_get("name")?,
                lat: row.try_get("lat")?,
                lon: row.try_get("lon")?,
            })
        })
        .transpose()
    }

    pub async fn find_run(&mut self, code: &str) -> Result<Option<Run>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, code, run_date, site, sequencing_method, machine, user,
                   number_samples, flowcell, passed_qc, comment
            FROM runs
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| run_from_row(&row)).transpose()
    }

    pub async fn save_run(&mut self, run: &mut Run) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match run.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE runs
                    SET code = ?, run_date = ?, site = ?, sequencing_method = ?, machine = ?,
                        user = ?, number_samples = ?, flowcell = ?, passed_qc = ?, comment = ?,
                        updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&run.code)
                .bind(run.run_date)
                .bind(&run.site)
                .bind(run.sequencing_method.as_str())
                .bind(&run.machine)
                .bind(&run.user)
                .bind(run.number_samples)
                .bind(&run.flowcell)
                .bind(run.passed_qc)
                .bind(&run.comment)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO runs (code, run_date, site, sequencing_method, machine, user,
                                      number_samples, flowcell, passed_qc, comment,
                                      created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&run.code)
                .bind(run.run_date)
                .bind(&run.site)
                .bind(run.sequencing_method.as_str())
                .bind(&run.machine)
                .bind(&run.user)
                .bind(run.number_samples)
                .bind(&run.flowcell)
                .bind(run.passed_qc)
                .bind(&run.comment)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                run.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn find_specimen(
        &mut self,
        accession: &str,
        collection_date: NaiveDate,
    ) -> Result<Option<Specimen>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, accession, collection_date, country_sample_taken_code,
                   specimen_type, specimen_qr_code, bar_code
            FROM specimens
            WHERE accession = ? AND collection_date = ?
            "#,
        )
        .bind(accession)
        .bind(collection_date)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| -> Result<Specimen, sqlx::Error> {
            Ok(Specimen {
                id: Some(row.try_get("id")?),
                owner_id: row.try_get("owner_id")?,
                accession: row.try_get("accession")?,
                collection_date: row.try_get("collection_date")?,
                country_sample_taken_code: row.try_get("country_sample_taken_code")?,
                specimen_type: row.try_get("specimen_type")?,
                specimen_qr_code: row.try_get("specimen_qr_code")?,
                bar_code: row.try_get("bar_code")?,
            })
        })
        .transpose()
    }

    pub async fn save_specimen(&mut self, specimen: &mut Specimen) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match specimen.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE specimens
                    SET owner_id = ?, accession = ?, collection_date = ?,
                        country_sample_taken_code = ?, specimen_type = ?,
                        specimen_qr_code = ?, bar_code = ?,
                        updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(specimen.owner_id)
                .bind(&specimen.accession)
                .bind(specimen.collection_date)
                .bind(&specimen.country_sample_taken_code)
                .bind(&specimen.specimen_type)
                .bind(&specimen.specimen_qr_code)
                .bind(&specimen.bar_code)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO specimens (owner_id, accession, collection_date,
                                           country_sample_taken_code, specimen_type,
                                           specimen_qr_code, bar_code, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(specimen.owner_id)
                .bind(&specimen.accession)
                .bind(specimen.collection_date)
                .bind(&specimen.country_sample_taken_code)
                .bind(&specimen.specimen_type)
                .bind(&specimen.specimen_qr_code)
                .bind(&specimen.bar_code)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                specimen.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn find_sample(&mut self, guid: &str) -> Result<Option<Sample>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, specimen_id, run_id, guid, sample_category, nucleic_acid_type
            FROM samples
            WHERE guid = ?
            "#,
        )
        .bind(guid)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| sample_from_row(&row)).transpose()
    }

    pub async fn save_sample(&mut self, sample: &mut Sample) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();
        let nucleic_acid_type = serde_json::to_string(&sample.nucleic_acid_type)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let sample_category = sample.sample_category.map(|c| c.as_str());

        match sample.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE samples
                    SET specimen_id = ?, run_id = ?, guid = ?, sample_category = ?,
                        nucleic_acid_type = ?, updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(sample.specimen_id)
                .bind(sample.run_id)
                .bind(&sample.guid)
                .bind(sample_category)
                .bind(&nucleic_acid_type)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO samples (specimen_id, run_id, guid, sample_category,
                                         nucleic_acid_type, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(sample.specimen_id)
                .bind(sample.run_id)
                .bind(&sample.guid)
                .bind(sample_category)
                .bind(&nucleic_acid_type)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                sample.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn find_storage(&mut self, storage_qr_code: &str) -> Result<Option<Storage>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, specimen_id, freezer, shelf, rack, tray, box, box_location,
                   storage_qr_code, date_into_storage, notes
            FROM storages
            WHERE storage_qr_code = ?
            "#,
        )
        .bind(storage_qr_code)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| -> Result<Storage, sqlx::Error> {
            Ok(Storage {
                id: Some(row.try_get("id")?),
                specimen_id: row.try_get("specimen_id")?,
                freezer: row.try_get("freezer")?,
                shelf: row.try_get("shelf")?,
                rack: row.try_get("rack")?,
                tray: row.try_get("tray")?,
                box_: row.try_get("box")?,
                box_location: row.try_get("box_location")?,
                storage_qr_code: row.try_get("storage_qr_code")?,
                date_into_storage: row.try_get("date_into_storage")?,
                notes: row.try_get("notes")?,
            })
        })
        .transpose()
    }

    pub async fn save_storage(&mut self, storage: &mut Storage) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match storage.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE storages
                    SET specimen_id = ?, freezer = ?, shelf = ?, rack = ?, tray = ?, box = ?,
                        box_location = ?, storage_qr_code = ?, date_into_storage = ?, notes = ?,
                        updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(storage.specimen_id)
                .bind(&storage.freezer)
                .bind(&storage.shelf)
                .bind(&storage.rack)
                .bind(&storage.tray)
                .bind(&storage.box_)
                .bind(&storage.box_location)
                .bind(&storage.storage_qr_code)
                .bind(storage.date_into_storage)
                .bind(&storage.notes)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO storages (specimen_id, freezer, shelf, rack, tray, box,
                                          box_location, storage_qr_code, date_into_storage,
                                          notes, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(storage.specimen_id)
                .bind(&storage.freezer)
                .bind(&storage.shelf)
                .bind(&storage.rack)
                .bind(&storage.tray)
                .bind(&storage.box_)
                .bind(&storage.box_location)
                .bind(&storage.storage_qr_code)
                .bind(storage.date_into_storage)
                .bind(&storage.notes)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                storage.id = Some(id);
                Ok(id)
            }
        }
    }
}

fn run_from_row(row: &SqliteRow) -> Result<Run, sqlx::Error> {
    let method: String = row.try_get("sequencing_method")?;

    Ok(Run {
        id: Some(row.try_get("id")?),
        code: row.try_get("code")?,
        run_date: row.try_get("run_date")?,
        site: row.try_get("site")?,
        sequencing_method: SequencingMethod::parse(&method)
            .ok_or_else(|| decode_error("runs.sequencing_method", &method))?,
        machine: row.try_get("machine")?,
        user: row.try_get("user")?,
        number_samples: row.try_get("number_samples")?,
        flowcell: row.try_get("flowcell")?,
        passed_qc: row.try_get("passed_qc")?,
        comment: row.try_get("comment")?,
    })
}

fn sample_from_row(row: &SqliteRow) -> Result<Sample, sqlx::Error> {
    let category: Option<String> = row.try_get("sample_category")?;
    let sample_category = match category {
        Some(c) => Some(
            SampleCategory::parse(&c).ok_or_else(|| decode_error("samples.sample_category", &c))?,
        ),
        None => None,
    };

    let acids: String = row.try_get("nucleic_acid_type")?;
    let nucleic_acid_type: BTreeSet<NucleicAcidType> =
        serde_json::from_str(&acids).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Sample {
        id: Some(row.try_get("id")?),
        specimen_id: row.try_get("specimen_id")?,
        run_id: row.try_get("run_id")?,
        guid: row.try_get("guid")?,
        sample_category,
        nucleic_acid_type,
    })
}
