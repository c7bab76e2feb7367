//! Database schema migrations
//!
//! Versioned, idempotent schema steps tracked in the `schema_version` table.
//! Importers never migrate: they call [`check_schema_version`] before
//! touching any row and refuse to run against a store whose version differs
//! from [`CURRENT_SCHEMA_VERSION`].
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - stores already at that version will not rerun them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Keep them idempotent** - `IF NOT EXISTS`, `INSERT OR IGNORE`, column checks

use crate::db::init::{
    create_analyses_table, create_countries_table, create_detail_tables,
    create_drug_resistance_tables, create_owners_table, create_runs_table, create_samples_table,
    create_specimens_table, create_speciations_table, create_spikes_table, create_storages_table,
};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Pre-flight gate for imports
///
/// Fails with [`Error::SchemaVersion`] unless the store is exactly at
/// [`CURRENT_SCHEMA_VERSION`].
pub async fn check_schema_version(pool: &SqlitePool) -> Result<()> {
    let found = get_schema_version(pool).await?;

    if found != CURRENT_SCHEMA_VERSION {
        return Err(Error::SchemaVersion {
            found,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }

    info!("Database schema version v{} verified", found);
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Err(Error::SchemaVersion {
            found: current_version,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: sample-tracking tables
///
/// Owners, countries, specimens, runs, samples, spikes, storage and the
/// specimen/sample attribute catalogs.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: sample-tracking tables");

    create_owners_table(pool).await?;
    create_countries_table(pool).await?;
    create_specimens_table(pool).await?;
    create_detail_tables(
        pool,
        "specimen_detail_types",
        "specimen_details",
        "specimen_id",
        "specimens",
        "specimen_detail_type_code",
    )
    .await?;
    create_runs_table(pool).await?;
    create_samples_table(pool).await?;
    create_detail_tables(
        pool,
        "sample_detail_types",
        "sample_details",
        "sample_id",
        "samples",
        "sample_detail_type_code",
    )
    .await?;
    create_spikes_table(pool).await?;
    create_storages_table(pool).await?;

    Ok(())
}

/// Migration v2: derived-analysis tables
///
/// Analyses with their speciation, drug resistance and free-form results.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: derived-analysis tables");

    create_analyses_table(pool).await?;
    create_speciations_table(pool).await?;
    create_drug_resistance_tables(pool).await?;
    create_detail_tables(
        pool,
        "other_types",
        "others",
        "analysis_id",
        "analyses",
        "other_type_code",
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_fresh_database_is_current() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
        check_schema_version(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory_database().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);

        let codes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drug_resistance_result_types")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(codes, 4);
    }

    #[tokio::test]
    async fn test_gate_rejects_newer_schema() {
        let pool = init_memory_database().await.unwrap();
        set_schema_version(&pool, CURRENT_SCHEMA_VERSION + 1).await.unwrap();

        match check_schema_version(&pool).await {
            Err(Error::SchemaVersion { found, expected }) => {
                assert_eq!(found, CURRENT_SCHEMA_VERSION + 1);
                assert_eq!(expected, CURRENT_SCHEMA_VERSION);
            }
            other => panic!("expected schema version error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_older_schema() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("DELETE FROM schema_version WHERE version = ?")
            .bind(CURRENT_SCHEMA_VERSION)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            check_schema_version(&pool).await,
            Err(Error::SchemaVersion { found: 1, .. })
        ));
    }
}
