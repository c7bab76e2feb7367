//! Attribute catalogs and their sparse value tables

use super::{decode_error, ImportStore};
use labtrack_common::db::{DetailRow, DetailType, DetailValue};
use labtrack_common::vocabulary::ValueType;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Which catalog/value table pair an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTable {
    Specimen,
    Sample,
    Other,
}

impl DetailTable {
    pub fn type_table(&self) -> &'static str {
        match self {
            DetailTable::Specimen => "specimen_detail_types",
            DetailTable::Sample => "sample_detail_types",
            DetailTable::Other => "other_types",
        }
    }

    pub fn value_table(&self) -> &'static str {
        match self {
            DetailTable::Specimen => "specimen_details",
            DetailTable::Sample => "sample_details",
            DetailTable::Other => "others",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            DetailTable::Specimen => "specimen_id",
            DetailTable::Sample => "sample_id",
            DetailTable::Other => "analysis_id",
        }
    }

    pub fn type_column(&self) -> &'static str {
        match self {
            DetailTable::Specimen => "specimen_detail_type_code",
            DetailTable::Sample => "sample_detail_type_code",
            DetailTable::Other => "other_type_code",
        }
    }
}

const VALUE_COLUMNS: [ValueType; 6] = [
    ValueType::Str,
    ValueType::Int,
    ValueType::Float,
    ValueType::Bool,
    ValueType::Date,
    ValueType::Text,
];

impl ImportStore {
    /// Read the full catalog, ordered by code
    pub async fn load_detail_types(&mut self, table: DetailTable) -> Result<Vec<DetailType>, sqlx::Error> {
        let sql = format!(
            "SELECT code, description, value_type FROM {} ORDER BY code",
            table.type_table()
        );
        let rows = sqlx::query(&sql).fetch_all(self.conn()?).await?;

        rows.iter()
            .map(|row| -> Result<DetailType, sqlx::Error> {
                let value_type: String = row.try_get("value_type")?;
                Ok(DetailType {
                    code: row.try_get("code")?,
                    description: row.try_get("description")?,
                    value_type: ValueType::parse(&value_type)
                        .ok_or_else(|| decode_error("value_type", &value_type))?,
                })
            })
            .collect()
    }

    pub async fn find_detail(
        &mut self,
        table: DetailTable,
        parent_id: i64,
        type_code: &str,
    ) -> Result<Option<DetailRow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT id, {parent} AS parent_id, {code} AS type_code,
                   value_str, value_int, value_float, value_bool, value_date, value_text
            FROM {values}
            WHERE {parent} = ? AND {code} = ?
            "#,
            parent = table.parent_column(),
            code = table.type_column(),
            values = table.value_table(),
        );

        let row = sqlx::query(&sql)
            .bind(parent_id)
            .bind(type_code)
            .fetch_optional(self.conn()?)
            .await?;

        row.map(|row| detail_from_row(&row)).transpose()
    }

    /// All detail rows of one parent, ordered by type code
    pub async fn list_details(
        &mut self,
        table: DetailTable,
        parent_id: i64,
    ) -> Result<Vec<DetailRow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT id, {parent} AS parent_id, {code} AS type_code,
                   value_str, value_int, value_float, value_bool, value_date, value_text
            FROM {values}
            WHERE {parent} = ?
            ORDER BY {code}
            "#,
            parent = table.parent_column(),
            code = table.type_column(),
            values = table.value_table(),
        );

        let rows = sqlx::query(&sql)
            .bind(parent_id)
            .fetch_all(self.conn()?)
            .await?;

        rows.iter().map(detail_from_row).collect()
    }

    pub async fn insert_detail(
        &mut self,
        table: DetailTable,
        parent_id: i64,
        type_code: &str,
        value: &DetailValue,
    ) -> Result<i64, sqlx::Error> {
        let audit_user = self.audit_user().to_string();
        let sql = format!(
            r#"
            INSERT INTO {values} ({parent}, {code}, {column}, created_by, updated_by)
            VALUES (?, ?, ?, ?, ?)
            "#,
            values = table.value_table(),
            parent = table.parent_column(),
            code = table.type_column(),
            column = value.value_type().column(),
        );

        let query = bind_value(sqlx::query(&sql).bind(parent_id).bind(type_code), value);
        let id = query
            .bind(&audit_user)
            .bind(&audit_user)
            .execute(self.conn()?)
            .await?
            .last_insert_rowid();

        Ok(id)
    }

    /// Overwrite the value, clearing every other value column
    pub async fn update_detail(
        &mut self,
        table: DetailTable,
        id: i64,
        value: &DetailValue,
    ) -> Result<(), sqlx::Error> {
        let audit_user = self.audit_user().to_string();
        let target = value.value_type();
        let clears: Vec<String> = VALUE_COLUMNS
            .iter()
            .filter(|t| **t != target)
            .map(|t| format!("{} = NULL", t.column()))
            .collect();

        let sql = format!(
            r#"
            UPDATE {values}
            SET {column} = ?, {clears}, updated_by = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            values = table.value_table(),
            column = target.column(),
            clears = clears.join(", "),
        );

        bind_value(sqlx::query(&sql), value)
            .bind(&audit_user)
            .bind(id)
            .execute(self.conn()?)
            .await?;

        Ok(())
    }

    pub async fn delete_detail(&mut self, table: DetailTable, id: i64) -> Result<(), sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table.value_table());
        sqlx::query(&sql).bind(id).execute(self.conn()?).await?;
        Ok(())
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &DetailValue) -> SqliteQuery<'q> {
    match value {
        DetailValue::Str(s) | DetailValue::Text(s) => query.bind(s.clone()),
        DetailValue::Int(i) => query.bind(*i),
        DetailValue::Float(f) => query.bind(*f),
        DetailValue::Bool(b) => query.bind(*b),
        DetailValue::Date(d) => query.bind(*d),
    }
}

fn detail_from_row(row: &SqliteRow) -> Result<DetailRow, sqlx::Error> {
    let value = if let Some(s) = row.try_get::<Option<String>, _>("value_str")? {
        Some(DetailValue::Str(s))
    } else if let Some(i) = row.try_get::<Option<i64>, _>("value_int")? {
        Some(DetailValue::Int(i))
    } else if let Some(f) = row.try_get::<Option<f64>, _>("value_float")? {
        Some(DetailValue::Float(f))
    } else if let Some(b) = row.try_get::<Option<bool>, _>("value_bool")? {
        Some(DetailValue::Bool(b))
    } else if let Some(d) = row.try_get::<Option<chrono::NaiveDate>, _>("value_date")? {
        Some(DetailValue::Date(d))
    } else {
        row.try_get::<Option<String>, _>("value_text")?
            .map(DetailValue::Text)
    };

    Ok(DetailRow {
        id: row.try_get("id")?,
        parent_id: row.try_get("parent_id")?,
        type_code: row.try_get("type_code")?,
        value,
    })
}
