//! Replace-by-Period Loader: idempotent delete-then-insert for one table
//! and one period key.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use super::{PERIOD_COLUMN, quote_ident};
use crate::report::{CellValue, ReportKind, SheetData};

/// Row counts from one load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub deleted: u64,
    pub inserted: u64,
}

/// Replace the rows of `kind`'s table for `period` with `sheet`, projected
/// onto `usable` columns.
///
/// Delete and inserts run in one transaction: a failed insert rolls the
/// whole period back, so a re-import either fully lands or leaves the prior
/// rows untouched. Coerced nulls are bound explicitly so column defaults
/// never leak in.
pub async fn load_period(
    pool: &SqlitePool,
    kind: ReportKind,
    period: NaiveDate,
    sheet: &SheetData,
    usable: &[String],
) -> Result<LoadReport> {
    let table = kind.table_name();
    if usable.is_empty() && !sheet.rows.is_empty() {
        bail!("no usable columns for table {}, refusing to load", table);
    }

    // Sheet position of every usable column; usable is a subset of the
    // sheet's columns by construction.
    let positions: Vec<usize> = usable
        .iter()
        .map(|name| {
            sheet
                .columns
                .iter()
                .position(|c| c == name)
                .with_context(|| format!("usable column {} not present in sheet", name))
        })
        .collect::<Result<_>>()?;

    let mut tx = pool
        .begin()
        .await
        .with_context(|| format!("failed to begin transaction for {}", table))?;

    let delete_sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(table),
        quote_ident(PERIOD_COLUMN),
    );
    let deleted = sqlx::query(&delete_sql)
        .bind(period)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to delete period {} from {}", period, table))?
        .rows_affected();

    let column_list: Vec<String> = usable
        .iter()
        .map(|c| quote_ident(c))
        .chain(std::iter::once(quote_ident(PERIOD_COLUMN)))
        .collect();
    let placeholders = vec!["?"; column_list.len()].join(", ");
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        column_list.join(", "),
        placeholders,
    );

    let mut inserted: u64 = 0;
    for row in &sheet.rows {
        let mut query = sqlx::query(&insert_sql);
        for &pos in &positions {
            query = bind_cell(query, row.get(pos).unwrap_or(&CellValue::Null));
        }
        query = query.bind(period);
        query.execute(&mut *tx).await.with_context(|| {
            format!(
                "insert into {} failed after {} of {} rows, period {} rolled back",
                table,
                inserted,
                sheet.rows.len(),
                period,
            )
        })?;
        inserted += 1;
    }

    tx.commit()
        .await
        .with_context(|| format!("failed to commit load of {}", table))?;

    Ok(LoadReport { deleted, inserted })
}

fn bind_cell<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q CellValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        CellValue::Null => query.bind(None::<String>),
        CellValue::Text(s) => query.bind(s.as_str()),
        CellValue::Integer(n) => query.bind(*n),
        CellValue::Decimal(f) => query.bind(*f),
    }
}
