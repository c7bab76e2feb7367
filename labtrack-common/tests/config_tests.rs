//! Configuration resolution tests
//!
//! Uses serial_test because LABTRACK_DATABASE / LABTRACK_CONFIG are process-wide.

use labtrack_common::config::{
    resolve_database_path, TomlConfig, CONFIG_ENV_VAR, DATABASE_ENV_VAR, DEFAULT_ASSAY_SYSTEM,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    let config = TomlConfig {
        database: Some(PathBuf::from("/config/labtrack.db")),
        ..Default::default()
    };

    env::set_var(DATABASE_ENV_VAR, "/env/labtrack.db");
    let path = resolve_database_path(None, &config);
    env::remove_var(DATABASE_ENV_VAR);

    assert_eq!(path, PathBuf::from("/env/labtrack.db"));
}

#[test]
#[serial]
fn test_config_file_beats_default() {
    env::remove_var(DATABASE_ENV_VAR);
    let config = TomlConfig {
        database: Some(PathBuf::from("/config/labtrack.db")),
        ..Default::default()
    };

    assert_eq!(
        resolve_database_path(None, &config),
        PathBuf::from("/config/labtrack.db")
    );
}

#[test]
#[serial]
fn test_default_database_path_is_named_labtrack() {
    env::remove_var(DATABASE_ENV_VAR);
    let path = resolve_database_path(None, &TomlConfig::default());
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("labtrack.db"));
}

#[test]
#[serial]
fn test_load_from_config_env_var() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
        database = "/data/lab.db"
        audit_user = "importer"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    env::set_var(CONFIG_ENV_VAR, &config_path);
    let config = TomlConfig::load(None);
    env::remove_var(CONFIG_ENV_VAR);

    let config = config.unwrap();
    assert_eq!(config.database, Some(PathBuf::from("/data/lab.db")));
    assert_eq!(config.audit_user.as_deref(), Some("importer"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.analysis.assay_system, DEFAULT_ASSAY_SYSTEM);
}

#[test]
#[serial]
fn test_explicit_missing_config_file_is_error() {
    let result = TomlConfig::load(Some(Path::new("/nonexistent/labtrack/config.toml")));
    assert!(result.is_err());
}
