//! One ingestion run: spreadsheet file -> normalized rows -> reconciled
//! columns -> replace-by-period load.

use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::Data;
use chrono::{Local, NaiveDate};
use sqlx::SqlitePool;

use crate::report::{self, ReportKind, read_grid, read_sheet};
use crate::store::loader::{LoadReport, load_period};
use crate::store::schema::reconcile;
use crate::store::table_columns;

/// Outcome of one ingestion run, for logging and API result messages.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub kind: ReportKind,
    pub period: NaiveDate,
    pub source_rows: usize,
    pub deleted: u64,
    pub inserted: u64,
    pub missing_in_table: Vec<String>,
    pub missing_in_incoming: Vec<String>,
}

/// Resolve the report kind for an upload path from its base name, after
/// checking the extension allowlist.
pub fn kind_for_path(path: &Path) -> Result<ReportKind> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !report::ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "unsupported file format for {}: only xls/xlsx are accepted",
            path.display()
        );
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("unreadable file name: {}", path.display()))?;
    ReportKind::from_file_stem(stem)
        .with_context(|| format!("{} is not a recognized report file", path.display()))
}

/// Ingest one spreadsheet file, stamping rows with today's date.
pub async fn ingest_file(pool: &SqlitePool, path: &Path) -> Result<IngestReport> {
    let kind = kind_for_path(path)?;
    let grid = read_grid(path)?;
    ingest_grid(pool, kind, &grid, Local::now().date_naive()).await
}

/// Ingest an in-memory grid for `kind` under the given period key.
pub async fn ingest_grid(
    pool: &SqlitePool,
    kind: ReportKind,
    grid: &[Vec<Data>],
    period: NaiveDate,
) -> Result<IngestReport> {
    let sheet = read_sheet(grid, kind);
    log::info!(
        "{}: {} data rows, {} columns in sheet",
        kind.table_name(),
        sheet.rows.len(),
        sheet.columns.len()
    );

    let table = table_columns(pool, kind).await?;
    let diff = reconcile(&sheet.columns, &table);
    if !diff.missing_in_table.is_empty() {
        log::warn!(
            "{}: sheet columns not in table, skipped: {:?}",
            kind.table_name(),
            diff.missing_in_table
        );
    }
    if !diff.missing_in_incoming.is_empty() {
        log::warn!(
            "{}: table columns not provided by sheet: {:?}",
            kind.table_name(),
            diff.missing_in_incoming
        );
    }

    let LoadReport { deleted, inserted } =
        load_period(pool, kind, period, &sheet, &diff.usable).await?;
    // load_period errors on any failed insert, so these counts agree on
    // every success path; the guard only catches that invariant breaking.
    if inserted as usize != sheet.rows.len() {
        bail!(
            "{}: inserted {} of {} rows for period {}",
            kind.table_name(),
            inserted,
            sheet.rows.len(),
            period
        );
    }
    log::info!(
        "{}: replaced period {} ({} deleted, {} inserted)",
        kind.table_name(),
        period,
        deleted,
        inserted
    );

    Ok(IngestReport {
        kind,
        period,
        source_rows: sheet.rows.len(),
        deleted,
        inserted,
        missing_in_table: diff.missing_in_table,
        missing_in_incoming: diff.missing_in_incoming,
    })
}
