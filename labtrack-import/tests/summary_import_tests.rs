//! Results-summary uploads: analyses, speciation, drug resistance, others

mod helpers;

use helpers::{
    capture_logs, count_rows, create_test_db, run_row, sample_row, seed_reference_data,
    workbook_with,
};
use labtrack_common::config::AnalysisConfig;
use labtrack_import::{import_summary, import_workbook, ImportOptions, ImportState, Sheet};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

const MAPPING: &str = "remote_sample_name,sample_name\nremote-1,sample-1\n";

fn options(dry_run: bool) -> ImportOptions {
    ImportOptions {
        dry_run,
        audit_user: "tester".to_string(),
    }
}

/// Seeded store holding run RUN-1 and sample sample-1
async fn store_with_sample() -> (TempDir, SqlitePool) {
    let (dir, pool) = create_test_db().await;
    seed_reference_data(&pool).await;

    let workbook = workbook_with(vec![
        (Sheet::Runs, vec![run_row("RUN-1")]),
        (Sheet::Samples, vec![sample_row("sample-1", "RUN-1", "123test", "2021-01-01")]),
    ]);
    let report = import_workbook(&pool, &workbook, &options(false)).await.unwrap();
    assert!(report.success(), "failures: {:?}", report.failures);

    (dir, pool)
}

fn write_inputs(dir: &TempDir, summary: &str, mapping: &str) -> (PathBuf, PathBuf) {
    let summary_path = dir.path().join("summary.csv");
    let mapping_path = dir.path().join("mapping.csv");
    std::fs::write(&summary_path, summary).unwrap();
    std::fs::write(&mapping_path, mapping).unwrap();
    (summary_path, mapping_path)
}

async fn drug_results(pool: &SqlitePool) -> Vec<(String, String)> {
    sqlx::query_as(
        "SELECT antibiotic, drug_resistance_result_type_code FROM drug_resistances ORDER BY antibiotic",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_summary_creates_analysis_tree() {
    let (dir, pool) = store_with_sample().await;
    let (summary, mapping) = write_inputs(
        &dir,
        "Sample ID,Batch,Main Species,Run Date,INH,RIF,pipeline_version,coverage\n\
         remote-1,B-01,Mycobacterium tuberculosis,2021-04-01,S,r,1.2.3,45.5\n",
        MAPPING,
    );

    let report = import_summary(&pool, &summary, &mapping, &options(false), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(report.success(), "failures: {:?}", report.failures);
    assert_eq!(report.state, ImportState::Committed);

    let (batch, assay): (String, String) =
        sqlx::query_as("SELECT batch_name, assay_system FROM analyses")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((batch.as_str(), assay.as_str()), ("B-01", "GPAS TB"));

    let (species, sub_species, number): (String, Option<String>, i64) =
        sqlx::query_as("SELECT species, sub_species, species_number FROM speciations")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(species, "Mycobacterium");
    assert_eq!(sub_species.as_deref(), Some("tuberculosis"));
    assert_eq!(number, 1);

    assert_eq!(
        drug_results(&pool).await,
        vec![
            ("isoniazid".to_string(), "S".to_string()),
            ("rifampicin".to_string(), "R".to_string()),
        ]
    );
    assert_eq!(count_rows(&pool, "others").await, 2);
}

#[tokio::test]
async fn test_reimport_updates_and_removes_results() {
    let (dir, pool) = store_with_sample().await;
    let config = AnalysisConfig::default();

    let (summary, mapping) = write_inputs(
        &dir,
        "Sample ID,Batch,Main Species,INH,RIF,PZA\nremote-1,B-01,Mycobacterium tuberculosis,R,R,S\n",
        MAPPING,
    );
    import_summary(&pool, &summary, &mapping, &options(false), &config).await.unwrap();
    assert_eq!(drug_results(&pool).await.len(), 3);

    // INH blank removes, RIF changes, PZA column absent stays
    let (summary, mapping) = write_inputs(
        &dir,
        "Sample ID,Batch,Main Species,INH,RIF\nremote-1,B-01,Mycobacterium tuberculosis,,S\n",
        MAPPING,
    );
    let report = import_summary(&pool, &summary, &mapping, &options(false), &config)
        .await
        .unwrap();

    assert!(report.success(), "failures: {:?}", report.failures);
    assert_eq!(report.sheet("Summary").unwrap().updated, 1);
    assert_eq!(count_rows(&pool, "analyses").await, 1);
    assert_eq!(
        drug_results(&pool).await,
        vec![
            ("pyrazinamide".to_string(), "S".to_string()),
            ("rifampicin".to_string(), "S".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unmapped_sample_fails_import() {
    let (dir, pool) = store_with_sample().await;
    let (logs, _guard) = capture_logs();
    let (summary, mapping) = write_inputs(
        &dir,
        "Sample ID,Batch,INH\nremote-1,B-01,S\nremote-2,B-01,R\n",
        MAPPING,
    );

    let report = import_summary(&pool, &summary, &mapping, &options(false), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.state, ImportState::RolledBack);
    logs.assert_contains("Summary Sheet Row 3 sample_name : Sample name not found in mapping file");
    assert_eq!(count_rows(&pool, "analyses").await, 0);
}

#[tokio::test]
async fn test_unknown_result_code_fails_row() {
    let (dir, pool) = store_with_sample().await;
    let (logs, _guard) = capture_logs();
    let (summary, mapping) = write_inputs(&dir, "Sample ID,Batch,INH,RIF\nremote-1,B-01,X,S\n", MAPPING);

    let report = import_summary(&pool, &summary, &mapping, &options(false), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(!report.success());
    logs.assert_contains("Summary Sheet Row 2 INH : Drug resistance result X does not exist");
    assert_eq!(count_rows(&pool, "drug_resistances").await, 0);
}

#[tokio::test]
async fn test_missing_species_is_skipped() {
    let (dir, pool) = store_with_sample().await;
    let (logs, _guard) = capture_logs();
    let (summary, mapping) = write_inputs(&dir, "Sample ID,Batch,Main Species\nremote-1,B-01,\n", MAPPING);

    let report = import_summary(&pool, &summary, &mapping, &options(false), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(report.success(), "failures: {:?}", report.failures);
    assert_eq!(count_rows(&pool, "analyses").await, 1);
    assert_eq!(count_rows(&pool, "speciations").await, 0);
    logs.assert_contains("Summary Sheet Row 2: Speciation for Batch B-01, Sample sample-1 not found");
}

#[tokio::test]
async fn test_summary_dry_run_rolls_back() {
    let (dir, pool) = store_with_sample().await;
    let (summary, mapping) = write_inputs(&dir, "Sample ID,Batch,INH\nremote-1,B-01,S\n", MAPPING);

    let report = import_summary(&pool, &summary, &mapping, &options(true), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(report.success());
    assert_eq!(report.state, ImportState::RolledBack);
    assert_eq!(report.sheet("Summary").unwrap().inserted, 1);
    assert_eq!(count_rows(&pool, "analyses").await, 0);
}

#[tokio::test]
async fn test_custom_drug_columns_and_assay() {
    let (dir, pool) = store_with_sample().await;
    let config = AnalysisConfig {
        assay_system: "In-house".to_string(),
        drugs: vec![labtrack_common::config::DrugColumn::new("Isoniazid result", "isoniazid")],
    };
    let (summary, mapping) = write_inputs(
        &dir,
        "Sample ID,Batch,Isoniazid result,INH\nremote-1,B-02,U,R\n",
        MAPPING,
    );

    let report = import_summary(&pool, &summary, &mapping, &options(false), &config)
        .await
        .unwrap();

    assert!(report.success(), "failures: {:?}", report.failures);
    assert_eq!(drug_results(&pool).await, vec![("isoniazid".to_string(), "U".to_string())]);
    let assay: String = sqlx::query_scalar("SELECT assay_system FROM analyses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(assay, "In-house");
}

#[tokio::test]
async fn test_missing_summary_file_fails() {
    let (dir, pool) = store_with_sample().await;
    let missing = dir.path().join("nope.csv");
    let mapping = dir.path().join("mapping.csv");
    std::fs::write(&mapping, MAPPING).unwrap();

    let report = import_summary(&pool, &missing, &mapping, &options(false), &AnalysisConfig::default())
        .await
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.failures[0].row, None);
}
