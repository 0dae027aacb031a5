//! Relational store: pool construction, one-time schema setup and column
//! introspection for the four report tables.

pub mod loader;
pub mod mutation;
pub mod query;
pub mod schema;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::report::ReportKind;

/// Surrogate primary key column present on every report table.
pub const ID_COLUMN: &str = "id";

/// Period-key column: the calendar date stamped on every row of one
/// ingestion run, and the replace scope for re-imports.
pub const PERIOD_COLUMN: &str = "当期日期";

/// Open a connection pool, creating the database file on first use.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url: {}", database_url))?
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {}", database_url))
}

/// Quote an identifier for SQL text. Every name passed here must already
/// come from the schema or the table allowlist, never from raw input.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Create the four report tables if absent and make sure each carries the
/// period-key column (covers tables created before the column existed).
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for kind in ReportKind::ALL {
        create_table(pool, kind).await?;
        ensure_period_column(pool, kind).await?;
    }
    Ok(())
}

async fn create_table(pool: &SqlitePool, kind: ReportKind) -> Result<()> {
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(kind.table_name()),
        quote_ident(ID_COLUMN),
    );
    for (name, column_type) in kind.schema() {
        ddl.push_str(&format!(", {} {}", quote_ident(name), column_type.sql()));
    }
    ddl.push_str(&format!(", {} DATE)", quote_ident(PERIOD_COLUMN)));

    sqlx::query(&ddl)
        .execute(pool)
        .await
        .with_context(|| format!("failed to create table {}", kind.table_name()))?;
    Ok(())
}

async fn ensure_period_column(pool: &SqlitePool, kind: ReportKind) -> Result<()> {
    let existing = table_columns(pool, kind).await?;
    if existing.iter().any(|c| c == PERIOD_COLUMN) {
        return Ok(());
    }
    log::info!(
        "adding period column to pre-existing table {}",
        kind.table_name()
    );
    let ddl = format!(
        "ALTER TABLE {} ADD COLUMN {} DATE",
        quote_ident(kind.table_name()),
        quote_ident(PERIOD_COLUMN),
    );
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .with_context(|| format!("failed to add period column to {}", kind.table_name()))?;
    Ok(())
}

/// Declared columns of a report table, in definition order, including the
/// surrogate key and the period column.
pub async fn table_columns(pool: &SqlitePool, kind: ReportKind) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(kind.table_name())
            .fetch_all(pool)
            .await
            .with_context(|| format!("failed to inspect table {}", kind.table_name()))?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // One connection only: each pooled connection would otherwise get its
    // own private in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    init_schema(&pool).await.expect("schema init");
    pool
}
