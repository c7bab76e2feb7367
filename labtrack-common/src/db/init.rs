//! Database initialization
//!
//! `init_database` creates (or opens) the store and brings its schema up to
//! date. `open_database` only connects; importers use it together with
//! [`check_schema_version`](crate::db::migrations::check_schema_version) so
//! that an out-of-date store is rejected instead of silently migrated.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Create the database if needed and run all pending migrations
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = connect(db_path, true).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema_version_table(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Open an existing database without touching its schema
pub async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "Database {} does not exist (run `labtrack-import init` first)",
            db_path.display()
        )));
    }

    let pool = connect(db_path, false).await?;
    info!("Opened existing database: {}", db_path.display());
    Ok(pool)
}

/// Single-connection in-memory database with the current schema
///
/// The pool is pinned to one connection that never expires, otherwise
/// SQLite would hand out a fresh, empty database per connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema_version_table(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    // One import holds one transaction; a handful of connections covers
    // the pre-flight reads that happen before it begins.
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_owners_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS owners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site TEXT NOT NULL,
            user TEXT NOT NULL,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (site, user)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Country reference data, loaded outside the importer
pub(crate) async fn create_countries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS countries (
            code TEXT PRIMARY KEY CHECK (length(code) = 3),
            code2 TEXT NOT NULL CHECK (length(code2) = 2),
            name TEXT NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_specimens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS specimens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL REFERENCES owners(id),
            accession TEXT NOT NULL,
            collection_date DATE NOT NULL,
            country_sample_taken_code TEXT NOT NULL REFERENCES countries(code),
            specimen_type TEXT,
            specimen_qr_code TEXT,
            bar_code TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (accession, collection_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            run_date DATE NOT NULL,
            site TEXT NOT NULL,
            sequencing_method TEXT NOT NULL
                CHECK (sequencing_method IN ('illumina', 'ont', 'pacbio')),
            machine TEXT NOT NULL,
            user TEXT,
            number_samples INTEGER,
            flowcell TEXT,
            passed_qc INTEGER,
            comment TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Samples table
///
/// `nucleic_acid_type` holds a JSON array of distinct values.
pub(crate) async fn create_samples_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            specimen_id INTEGER NOT NULL REFERENCES specimens(id),
            run_id INTEGER NOT NULL REFERENCES runs(id),
            guid TEXT NOT NULL UNIQUE,
            sample_category TEXT
                CHECK (sample_category IS NULL OR sample_category IN ('culture', 'uncultured')),
            nucleic_acid_type TEXT NOT NULL DEFAULT '[]',
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_spikes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spikes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sample_id INTEGER NOT NULL REFERENCES samples(id),
            name TEXT NOT NULL,
            quantity TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (sample_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_storages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            specimen_id INTEGER NOT NULL REFERENCES specimens(id),
            freezer TEXT NOT NULL,
            shelf TEXT NOT NULL,
            rack TEXT NOT NULL,
            tray TEXT NOT NULL,
            box TEXT NOT NULL,
            box_location TEXT NOT NULL,
            storage_qr_code TEXT NOT NULL UNIQUE,
            date_into_storage DATE NOT NULL,
            notes TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_analyses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sample_id INTEGER NOT NULL REFERENCES samples(id),
            batch_name TEXT NOT NULL,
            assay_system TEXT NOT NULL,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (sample_id, batch_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn create_speciations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speciations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            analysis_id INTEGER NOT NULL REFERENCES analyses(id),
            species_number INTEGER NOT NULL,
            species TEXT NOT NULL,
            sub_species TEXT,
            analysis_date DATE,
            data TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (analysis_id, species_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Drug resistance result codes, seeded with the four GPAS outcomes
pub(crate) async fn create_drug_resistance_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drug_resistance_result_types (
            code TEXT PRIMARY KEY CHECK (length(code) = 1),
            description TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO drug_resistance_result_types (code, description) VALUES
            ('S', 'Susceptible'),
            ('R', 'Resistant'),
            ('U', 'Unknown'),
            ('F', 'Failed')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drug_resistances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            analysis_id INTEGER NOT NULL REFERENCES analyses(id),
            antibiotic TEXT NOT NULL,
            drug_resistance_result_type_code TEXT NOT NULL
                REFERENCES drug_resistance_result_types(code),
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (analysis_id, antibiotic)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create a catalog table and its sparse value table
///
/// Used for specimen_detail_types/specimen_details,
/// sample_detail_types/sample_details and other_types/others.
pub(crate) async fn create_detail_tables(
    pool: &SqlitePool,
    type_table: &str,
    value_table: &str,
    parent_column: &str,
    parent_table: &str,
    type_column: &str,
) -> Result<()> {
    let create_types = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {type_table} (
            code TEXT PRIMARY KEY,
            description TEXT,
            value_type TEXT NOT NULL
                CHECK (value_type IN ('str', 'int', 'float', 'bool', 'date', 'text')),
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    );
    sqlx::query(&create_types).execute(pool).await?;

    let create_values = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {value_table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {parent_column} INTEGER NOT NULL REFERENCES {parent_table}(id),
            {type_column} TEXT NOT NULL REFERENCES {type_table}(code),
            value_str TEXT,
            value_int INTEGER,
            value_float REAL,
            value_bool INTEGER,
            value_date DATE,
            value_text TEXT,
            created_by TEXT NOT NULL DEFAULT 'labtrack',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL DEFAULT 'labtrack',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE ({parent_column}, {type_column})
        )
        "#
    );
    sqlx::query(&create_values).execute(pool).await?;

    Ok(())
}
