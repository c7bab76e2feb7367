//! Derived-analysis rows: analyses, speciations, drug resistances

use super::ImportStore;
use labtrack_common::db::{Analysis, DrugResistance, DrugResistanceResultType, Speciation};
use sqlx::Row;

impl ImportStore {
    pub async fn find_analysis(
        &mut self,
        sample_id: i64,
        batch_name: &str,
    ) -> Result<Option<Analysis>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, sample_id, batch_name, assay_system FROM analyses WHERE sample_id = ? AND batch_name = ?",
        )
        .bind(sample_id)
        .bind(batch_name)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| -> Result<Analysis, sqlx::Error> {
            Ok(Analysis {
                id: Some(row.try_get("id")?),
                sample_id: row.try_get("sample_id")?,
                batch_name: row.try_get("batch_name")?,
                assay_system: row.try_get("assay_system")?,
            })
        })
        .transpose()
    }

    pub async fn save_analysis(&mut self, analysis: &mut Analysis) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match analysis.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE analyses
                    SET assay_system = ?, updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&analysis.assay_system)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO analyses (sample_id, batch_name, assay_system, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(analysis.sample_id)
                .bind(&analysis.batch_name)
                .bind(&analysis.assay_system)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                analysis.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn find_speciation(
        &mut self,
        analysis_id: i64,
        species_number: i64,
    ) -> Result<Option<Speciation>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, analysis_id, species_number, species, sub_species, analysis_date
            FROM speciations
            WHERE analysis_id = ? AND species_number = ?
            "#,
        )
        .bind(analysis_id)
        .bind(species_number)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| -> Result<Speciation, sqlx::Error> {
            Ok(Speciation {
                id: Some(row.try_get("id")?),
                analysis_id: row.try_get("analysis_id")?,
                species_number: row.try_get("species_number")?,
                species: row.try_get("species")?,
                sub_species: row.try_get("sub_species")?,
                analysis_date: row.try_get("analysis_date")?,
            })
        })
        .transpose()
    }

    pub async fn save_speciation(&mut self, speciation: &mut Speciation) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match speciation.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE speciations
                    SET species = ?, sub_species = ?, analysis_date = ?,
                        updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&speciation.species)
                .bind(&speciation.sub_species)
                .bind(speciation.analysis_date)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO speciations (analysis_id, species_number, species, sub_species,
                                             analysis_date, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(speciation.analysis_id)
                .bind(speciation.species_number)
                .bind(&speciation.species)
                .bind(&speciation.sub_species)
                .bind(speciation.analysis_date)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                speciation.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn find_result_type(
        &mut self,
        code: &str,
    ) -> Result<Option<DrugResistanceResultType>, sqlx::Error> {
        let row = sqlx::query("SELECT code, description FROM drug_resistance_result_types WHERE code = ?")
            .bind(code)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(|row| -> Result<DrugResistanceResultType, sqlx::Error> {
            Ok(DrugResistanceResultType {
                code: row.try_get("code")?,
                description: row.try_get("description")?,
            })
        })
        .transpose()
    }

    pub async fn find_drug_resistance(
        &mut self,
        analysis_id: i64,
        antibiotic: &str,
    ) -> Result<Option<DrugResistance>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, analysis_id, antibiotic, drug_resistance_result_type_code
            FROM drug_resistances
            WHERE analysis_id = ? AND antibiotic = ?
            "#,
        )
        .bind(analysis_id)
        .bind(antibiotic)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(|row| -> Result<DrugResistance, sqlx::Error> {
            Ok(DrugResistance {
                id: Some(row.try_get("id")?),
                analysis_id: row.try_get("analysis_id")?,
                antibiotic: row.try_get("antibiotic")?,
                drug_resistance_result_type_code: row.try_get("drug_resistance_result_type_code")?,
            })
        })
        .transpose()
    }

    pub async fn save_drug_resistance(&mut self, result: &mut DrugResistance) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match result.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE drug_resistances
                    SET drug_resistance_result_type_code = ?, updated_by = ?,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&result.drug_resistance_result_type_code)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO drug_resistances (analysis_id, antibiotic,
                                                  drug_resistance_result_type_code,
                                                  created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(result.analysis_id)
                .bind(&result.antibiotic)
                .bind(&result.drug_resistance_result_type_code)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                result.id = Some(id);
                Ok(id)
            }
        }
    }

    pub async fn delete_drug_resistance(&mut self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM drug_resistances WHERE id = ?")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }
}
