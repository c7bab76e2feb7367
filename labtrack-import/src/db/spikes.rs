//! Spike rows of a sample

use super::ImportStore;
use labtrack_common::db::Spike;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

impl ImportStore {
    pub async fn find_spike(&mut self, sample_id: i64, name: &str) -> Result<Option<Spike>, sqlx::Error> {
        let row = sqlx::query("SELECT id, sample_id, name, quantity FROM spikes WHERE sample_id = ? AND name = ?")
            .bind(sample_id)
            .bind(name)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(|row| spike_from_row(&row)).transpose()
    }

    pub async fn list_spikes(&mut self, sample_id: i64) -> Result<Vec<Spike>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, sample_id, name, quantity FROM spikes WHERE sample_id = ? ORDER BY name")
            .bind(sample_id)
            .fetch_all(self.conn()?)
            .await?;

        rows.iter().map(spike_from_row).collect()
    }

    pub async fn save_spike(&mut self, spike: &mut Spike) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();

        match spike.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE spikes
                    SET quantity = ?, updated_by = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&spike.quantity)
                .bind(&audit_user)
                .bind(id)
                .execute(self.conn()?)
                .await?;
                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO spikes (sample_id, name, quantity, created_by, updated_by)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(spike.sample_id)
                .bind(&spike.name)
                .bind(&spike.quantity)
                .bind(&audit_user)
                .bind(&audit_user)
                .execute(self.conn()?)
                .await?
                .last_insert_rowid();

                spike.id = Some(id);
                Ok(id)
            }
        }
    }

    /// Delete every spike of the sample whose name is not in `keep`
    ///
    /// Returns the number of rows removed.
    pub async fn delete_spikes_except(&mut self, sample_id: i64, keep: &[String]) -> Result<u64, sqlx::Error> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM spikes WHERE sample_id = ");
        builder.push_bind(sample_id);

        if !keep.is_empty() {
            builder.push(" AND name NOT IN (");
            let mut separated = builder.separated(", ");
            for name in keep {
                separated.push_bind(name.as_str());
            }
            separated.push_unseparated(")");
        }

        let result = builder.build().execute(self.conn()?).await?;
        Ok(result.rows_affected())
    }
}

fn spike_from_row(row: &SqliteRow) -> Result<Spike, sqlx::Error> {
    Ok(Spike {
        id: Some(row.try_get("id")?),
        sample_id: row.try_get("sample_id")?,
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
    })
}
