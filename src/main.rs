mod config;
mod export;
mod ingest;
mod report;
mod server;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::AppConfig;
use report::ReportKind;

#[derive(Parser)]
#[command(name = "reportdesk", version)]
#[command(about = "Spreadsheet report ingestion and browsing service")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve {
        /// Listen address, overriding the configured one.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Import report spreadsheets. With no arguments, scans the configured
    /// import directory for the four well-known filenames.
    Import {
        /// Spreadsheet files to ingest.
        files: Vec<PathBuf>,
    },
    /// Create the report tables and apply the period-column addition.
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let app_config = AppConfig::load(cli.config.as_deref())?;
    let pool = store::connect(&app_config.database_url).await?;
    store::init_schema(&pool).await?;

    match cli.command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| app_config.listen.clone());
            server::run(&listen, pool).await
        }
        Command::Import { files } => {
            let files = if files.is_empty() {
                well_known_files(&app_config.import_dir)
            } else {
                files
            };
            if files.is_empty() {
                log::warn!(
                    "no report files found in {}",
                    app_config.import_dir.display()
                );
                return Ok(());
            }
            let mut failures = 0;
            for file in &files {
                match ingest::ingest_file(&pool, file).await {
                    Ok(report) => log::info!(
                        "{}: {} rows imported for {}",
                        file.display(),
                        report.inserted,
                        report.period
                    ),
                    Err(err) => {
                        failures += 1;
                        log::error!("{}: import failed: {:#}", file.display(), err);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} of {} files failed to import", failures, files.len());
            }
            Ok(())
        }
        Command::InitDb => {
            // Schema setup already ran above; this command just makes it
            // an explicit, scriptable step.
            log::info!("report tables ready");
            Ok(())
        }
    }
}

/// The four well-known report files, in either accepted format, present in
/// `dir`. Absent files are skipped, matching the batch-import behavior.
fn well_known_files(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for kind in ReportKind::ALL {
        for extension in report::ALLOWED_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", kind.file_stem(), extension));
            if candidate.exists() {
                files.push(candidate);
                break;
            }
        }
    }
    files
}
