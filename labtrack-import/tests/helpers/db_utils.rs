//! Database Test Utilities
//!
//! Temporary stores and the reference data an upload expects to find

use labtrack_common::db::init_database;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Id of the `123test / 2021-01-01` specimen created by [`seed_reference_data`]
pub const SEEDED_SPECIMEN_ID: i64 = 1;

/// Create temporary test database with migrations applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_labtrack.db");
    let pool = init_database(&db_path).await.unwrap();
    (temp_dir, pool)
}

/// Countries, attribute catalogs and one existing specimen
///
/// - countries GBR, ZAF, IND
/// - owner SiteC / User3 (id 1) with specimen 123test / 2021-01-01 (id 1)
/// - specimen details: organism, host, host_diseases, isolation_source, lat, lon
/// - sample details: extraction_date, extraction_method, input_volume, dna_amplification, prep_kit, comment
/// - other types: pipeline_version (str), coverage (float)
pub async fn seed_reference_data(pool: &SqlitePool) {
    for (code, code2, name, lat, lon) in [
        ("GBR", "GB", "United Kingdom", 54.0, -2.0),
        ("ZAF", "ZA", "South Africa", -29.0, 24.0),
        ("IND", "IN", "India", 21.0, 78.0),
    ] {
        sqlx::query("INSERT INTO countries (code, code2, name, lat, lon) VALUES (?, ?, ?, ?, ?)")
            .bind(code)
            .bind(code2)
            .bind(name)
            .bind(lat)
            .bind(lon)
            .execute(pool)
            .await
            .unwrap();
    }

    let catalogs: [(&str, &[(&str, &str)]); 3] = [
        (
            "specimen_detail_types",
            &[
                ("organism", "str"),
                ("host", "str"),
                ("host_diseases", "str"),
                ("isolation_source", "str"),
                ("lat", "float"),
                ("lon", "float"),
            ],
        ),
        (
            "sample_detail_types",
            &[
                ("extraction_date", "date"),
                ("extraction_method", "str"),
                ("input_volume", "float"),
                ("dna_amplification", "bool"),
                ("prep_kit", "str"),
                ("comment", "text"),
            ],
        ),
        (
            "other_types",
            &[("pipeline_version", "str"), ("coverage", "float")],
        ),
    ];
    for (table, types) in catalogs {
        for &(code, value_type) in types {
            let sql = format!("INSERT INTO {} (code, value_type) VALUES (?, ?)", table);
            sqlx::query(&sql)
                .bind(code)
                .bind(value_type)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    sqlx::query("INSERT INTO owners (id, site, user) VALUES (1, 'SiteC', 'User3')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"
        INSERT INTO specimens (id, owner_id, accession, collection_date, country_sample_taken_code)
        VALUES (?, 1, '123test', '2021-01-01', 'GBR')
        "#,
    )
    .bind(SEEDED_SPECIMEN_ID)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&sql).fetch_one(pool).await.unwrap()
}
