//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the database location
pub const DATABASE_ENV_VAR: &str = "LABTRACK_DATABASE";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "LABTRACK_CONFIG";

/// Audit user recorded when nothing else is configured
pub const DEFAULT_AUDIT_USER: &str = "labtrack";

/// Assay system recorded on derived-analysis imports
pub const DEFAULT_ASSAY_SYSTEM: &str = "GPAS TB";

/// On-disk TOML configuration
///
/// Every section is optional; missing keys fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Database file path
    pub database: Option<PathBuf>,
    /// Name written to created_by / updated_by
    pub audit_user: Option<String>,
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "labtrack_import=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Settings for the results-summary import
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub assay_system: String,
    /// Summary columns carrying one resistance code per antibiotic
    pub drugs: Vec<DrugColumn>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            assay_system: DEFAULT_ASSAY_SYSTEM.to_string(),
            drugs: default_drug_columns(),
        }
    }
}

/// Maps a summary column header to the antibiotic it reports on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrugColumn {
    pub column: String,
    pub antibiotic: String,
}

impl DrugColumn {
    pub fn new(column: &str, antibiotic: &str) -> Self {
        Self {
            column: column.to_string(),
            antibiotic: antibiotic.to_string(),
        }
    }
}

/// First- and second-line TB panel as reported by the GPAS summary
fn default_drug_columns() -> Vec<DrugColumn> {
    [
        ("INH", "isoniazid"),
        ("RIF", "rifampicin"),
        ("PZA", "pyrazinamide"),
        ("EMB", "ethambutol"),
        ("AMI", "amikacin"),
        ("KAN", "kanamycin"),
        ("LEV", "levofloxacin"),
        ("STM", "streptomycin"),
        ("ETH", "ethionamide"),
        ("MXF", "moxifloxacin"),
        ("CAP", "capreomycin"),
        ("LZD", "linezolid"),
        ("BDQ", "bedaquiline"),
        ("DLM", "delamanid"),
        ("CFZ", "clofazimine"),
    ]
    .into_iter()
    .map(|(column, antibiotic)| DrugColumn::new(column, antibiotic))
    .collect()
}

impl TomlConfig {
    /// Parse a config file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config file, falling back to defaults when none is present
    ///
    /// An explicit path that cannot be read or parsed is an error; a missing
    /// default config file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        match default_config_file() {
            Ok(path) => {
                debug!("Loading config file {}", path.display());
                Self::from_file(&path)
            }
            Err(e) => {
                warn!("{}; using built-in defaults", e);
                Ok(Self::default())
            }
        }
    }
}

/// Database path resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.database {
        return path.clone();
    }

    get_default_database_path()
}

/// Audit user resolution: CLI, then config file, then the login name
pub fn resolve_audit_user(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    cli_arg
        .map(str::to_string)
        .or_else(|| config.audit_user.clone())
        .or_else(|| std::env::var("USER").ok())
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AUDIT_USER.to_string())
}

/// Locate the default configuration file for the platform
fn default_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("labtrack").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/labtrack/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default database location
fn get_default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("labtrack").join("labtrack.db"))
        .unwrap_or_else(|| PathBuf::from("./labtrack_data/labtrack.db"))
}
