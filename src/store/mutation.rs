//! Row Mutation Service: single-row insert, update and delete plus the row
//! fetch behind bulk export.
//!
//! Field maps come from interactively edited grid data and follow their
//! own rules, separate from ingestion-time coercion: unknown fields are
//! dropped against the declared schema, and empty strings become null
//! before persisting.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use super::{ID_COLUMN, PERIOD_COLUMN, quote_ident, table_columns};
use crate::report::ReportKind;

/// Filter a request field map down to real, writable table columns and
/// normalize empty-string values to null.
async fn writable_fields(
    pool: &SqlitePool,
    kind: ReportKind,
    fields: &Map<String, Value>,
) -> Result<Vec<(String, Value)>> {
    let table = table_columns(pool, kind).await?;
    let filtered: Vec<(String, Value)> = fields
        .iter()
        .filter(|(name, _)| {
            name.as_str() != ID_COLUMN && table.iter().any(|c| c == name.as_str())
        })
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) if s.trim().is_empty() => Value::Null,
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect();
    Ok(filtered)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                bail!("unsupported numeric value: {}", n);
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => {
            bail!("nested values are not valid field data")
        }
    })
}

/// Insert one row, returning the assigned surrogate key.
pub async fn insert_row(
    pool: &SqlitePool,
    kind: ReportKind,
    fields: &Map<String, Value>,
) -> Result<i64> {
    let writable = writable_fields(pool, kind, fields).await?;
    if writable.is_empty() {
        bail!("no valid fields for table {}", kind.table_name());
    }

    let columns: Vec<String> = writable.iter().map(|(name, _)| quote_ident(name)).collect();
    let placeholders = vec!["?"; writable.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(kind.table_name()),
        columns.join(", "),
        placeholders,
    );

    let mut query = sqlx::query(&sql);
    for (_, value) in &writable {
        query = bind_value(query, value)?;
    }
    let result = query
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert into {}", kind.table_name()))?;
    Ok(result.last_insert_rowid())
}

/// Update one row by surrogate key. Returns the number of matched rows; a
/// zero means the key does not exist and is the caller's request error.
pub async fn update_row(
    pool: &SqlitePool,
    kind: ReportKind,
    id: i64,
    fields: &Map<String, Value>,
) -> Result<u64> {
    let writable = writable_fields(pool, kind, fields).await?;
    if writable.is_empty() {
        bail!("no valid fields for table {}", kind.table_name());
    }

    let assignments: Vec<String> = writable
        .iter()
        .map(|(name, _)| format!("{} = ?", quote_ident(name)))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(kind.table_name()),
        assignments.join(", "),
        quote_ident(ID_COLUMN),
    );

    let mut query = sqlx::query(&sql);
    for (_, value) in &writable {
        query = bind_value(query, value)?;
    }
    query = query.bind(id);
    let result = query
        .execute(pool)
        .await
        .with_context(|| format!("failed to update {}", kind.table_name()))?;
    Ok(result.rows_affected())
}

/// Delete one row by surrogate key. Returns the number of deleted rows.
pub async fn delete_row(pool: &SqlitePool, kind: ReportKind, id: i64) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(kind.table_name()),
        quote_ident(ID_COLUMN),
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete from {}", kind.table_name()))?;
    Ok(result.rows_affected())
}

/// Rows for bulk export: the given ids, projected onto every column except
/// the surrogate key and the period column, in id order.
pub async fn export_rows(
    pool: &SqlitePool,
    kind: ReportKind,
    ids: &[i64],
) -> Result<(Vec<String>, Vec<Map<String, Value>>)> {
    if ids.is_empty() {
        bail!("empty id set for export from {}", kind.table_name());
    }

    let columns: Vec<String> = table_columns(pool, kind)
        .await?
        .into_iter()
        .filter(|c| c != ID_COLUMN && c != PERIOD_COLUMN)
        .collect();
    let select_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
        select_list.join(", "),
        quote_ident(kind.table_name()),
        quote_ident(ID_COLUMN),
        placeholders,
        quote_ident(ID_COLUMN),
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to fetch export rows from {}", kind.table_name()))?;
    let rows = rows
        .iter()
        .map(super::query::row_to_json)
        .collect::<Result<Vec<_>>>()?;

    Ok((columns, rows))
}
