//! labtrack-import - spreadsheet upload tool for the sample-tracking database
//!
//! Subcommands:
//! - `init`: create or migrate the database
//! - `upload <WORKBOOK>`: reconcile a Runs/Specimens/Samples/Storage workbook
//!   (spreadsheet file or directory of CSV sheets)
//! - `summary <SUMMARY> <MAPPING>`: reconcile a results summary
//!
//! Exit status is 0 when the import succeeded (including clean dry runs), 1 otherwise.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labtrack_common::config::{resolve_audit_user, resolve_database_path, TomlConfig};
use labtrack_common::db::{init_database, open_database};
use labtrack_import::sheet::open_workbook;
use labtrack_import::{import_summary, import_workbook, ImportOptions, ImportReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "labtrack-import")]
#[command(about = "Upload sample-tracking spreadsheets into the labtrack database")]
#[command(version)]
struct Cli {
    /// Database file (overrides LABTRACK_DATABASE and the config file)
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    /// TOML config file (overrides LABTRACK_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Name recorded in created_by / updated_by
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database or bring its schema up to date
    Init,

    /// Upload a workbook with Runs, Specimens, Samples and Storage sheets
    ///
    /// WORKBOOK is an xlsx/xls/ods file, or a directory holding Runs.csv,
    /// Specimens.csv, Samples.csv and Storage.csv
    Upload {
        workbook: PathBuf,

        /// Validate and reconcile everything, then roll back
        #[arg(long)]
        dryrun: bool,
    },

    /// Upload a results summary joined to its sample mapping file
    Summary {
        summary: PathBuf,
        mapping: PathBuf,

        #[arg(long)]
        dryrun: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = TomlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "labtrack-import {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = resolve_database_path(cli.database.as_deref(), &config);
    info!("Database: {}", db_path.display());

    let audit_user = resolve_audit_user(cli.user.as_deref(), &config);

    let report = match cli.command {
        Command::Init => {
            init_database(&db_path)
                .await
                .with_context(|| format!("Failed to initialize {}", db_path.display()))?;
            info!("Database ready");
            return Ok(ExitCode::SUCCESS);
        }
        Command::Upload { workbook, dryrun } => {
            let pool = open_database(&db_path).await?;
            let workbook = open_workbook(&workbook)?;
            let options = ImportOptions {
                dry_run: dryrun,
                audit_user,
            };
            import_workbook(&pool, workbook.as_ref(), &options).await?
        }
        Command::Summary {
            summary,
            mapping,
            dryrun,
        } => {
            let pool = open_database(&db_path).await?;
            let options = ImportOptions {
                dry_run: dryrun,
                audit_user,
            };
            import_summary(&pool, &summary, &mapping, &options, &config.analysis).await?
        }
    };

    Ok(exit_code(&report))
}

fn exit_code(report: &ImportReport) -> ExitCode {
    for sheet in &report.sheets {
        info!(
            "{}: {} rows, {} added, {} updated, {} failed",
            sheet.sheet, sheet.rows, sheet.inserted, sheet.updated, sheet.failed
        );
    }

    if report.success() {
        ExitCode::SUCCESS
    } else {
        error!("{} problem(s) found", report.failures.len());
        ExitCode::FAILURE
    }
}
