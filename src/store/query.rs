//! Query Builder: turn request parameters into parameterized filter, sort
//! and pagination SQL over a report table.
//!
//! Identifiers never come from raw input: the table name is resolved through
//! the [`ReportKind`] allowlist and every column is checked against the
//! table's declared columns before it appears in SQL text. Only values go
//! through parameter binding.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use super::{ID_COLUMN, PERIOD_COLUMN, quote_ident, table_columns};
use crate::report::ReportKind;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    /// Unrecognized or absent directions default to ascending.
    pub fn parse(raw: &str) -> SortDir {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Request-scoped description of one grid query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub kind: ReportKind,
    /// Requested output columns; empty means the default projection (all
    /// columns except the surrogate key).
    pub fields: Vec<String>,
    /// (field, direction) pairs in priority order.
    pub sort: Vec<(String, SortDir)>,
    /// Free-text substring search, OR-matched across output columns.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl QuerySpec {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            sort: Vec::new(),
            search: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Pair up positional `sort_field` / `sort_order` comma lists. Orders
/// beyond the field list are ignored; missing orders default to ascending.
pub fn parse_sort(sort_field: &str, sort_order: &str) -> Vec<(String, SortDir)> {
    let orders: Vec<&str> = sort_order.split(',').collect();
    sort_field
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .enumerate()
        .map(|(i, field)| {
            let dir = orders.get(i).map(|o| SortDir::parse(o)).unwrap_or(SortDir::Asc);
            (field.to_string(), dir)
        })
        .collect()
}

/// Split a comma list of requested output columns.
pub fn parse_fields(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Generated statements plus the bound search parameters. The data
/// statement additionally expects LIMIT and OFFSET bound after these.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub count_sql: String,
    pub data_sql: String,
    pub params: Vec<String>,
    /// Resolved output projection after allowlisting.
    pub columns: Vec<String>,
}

/// Build count and data statements for `spec` against the table's declared
/// columns. Unknown fields are silently dropped, not errored.
pub fn build_query(spec: &QuerySpec, table: &[String]) -> BuiltQuery {
    let requested: Vec<String> = spec
        .fields
        .iter()
        .filter(|f| table.contains(f))
        .cloned()
        .collect();
    let columns: Vec<String> = if requested.is_empty() {
        table.iter().filter(|c| c.as_str() != ID_COLUMN).cloned().collect()
    } else {
        requested
    };

    let table_sql = quote_ident(spec.kind.table_name());
    let select_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();

    let mut params = Vec::new();
    let where_clause = match spec.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => {
            let searchable: Vec<&String> = columns
                .iter()
                .filter(|c| c.as_str() != ID_COLUMN && c.as_str() != PERIOD_COLUMN)
                .collect();
            if searchable.is_empty() {
                String::new()
            } else {
                let clauses: Vec<String> = searchable
                    .iter()
                    .map(|c| format!("{} LIKE ?", quote_ident(c)))
                    .collect();
                params = vec![format!("%{}%", term); clauses.len()];
                format!(" WHERE ({})", clauses.join(" OR "))
            }
        }
        _ => String::new(),
    };

    let order_clause = {
        let keys: Vec<String> = spec
            .sort
            .iter()
            .filter(|(field, _)| columns.contains(field))
            .map(|(field, dir)| format!("{} {}", quote_ident(field), dir.sql()))
            .collect();
        if keys.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", keys.join(", "))
        }
    };

    let count_sql = format!("SELECT COUNT(*) FROM {}{}", table_sql, where_clause);
    let data_sql = format!(
        "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
        select_list.join(", "),
        table_sql,
        where_clause,
        order_clause,
    );

    BuiltQuery {
        count_sql,
        data_sql,
        params,
        columns,
    }
}

/// One page of query results, shaped for the JSON API.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub total_records: u64,
    pub total_pages: u64,
    pub page: u32,
    pub per_page: u32,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

pub fn total_pages(total_records: u64, per_page: u32) -> u64 {
    total_records.div_ceil(per_page.max(1) as u64)
}

/// Execute `spec`: shared filter clause for count and data so the page
/// count stays consistent with the windowed rows.
pub async fn run_query(pool: &SqlitePool, spec: &QuerySpec) -> Result<QueryPage> {
    let table = table_columns(pool, spec.kind).await?;
    let built = build_query(spec, &table);

    let mut count_query = sqlx::query_scalar::<_, i64>(&built.count_sql);
    for param in &built.params {
        count_query = count_query.bind(param.as_str());
    }
    let total_records = count_query
        .fetch_one(pool)
        .await
        .with_context(|| format!("count query failed for {}", spec.kind.table_name()))?
        .max(0) as u64;

    let page = spec.page.max(1);
    let per_page = spec.per_page.clamp(1, MAX_PER_PAGE);
    let offset = (page as i64 - 1) * per_page as i64;

    let mut data_query = sqlx::query(&built.data_sql);
    for param in &built.params {
        data_query = data_query.bind(param.as_str());
    }
    data_query = data_query.bind(per_page as i64).bind(offset);

    let rows = data_query
        .fetch_all(pool)
        .await
        .with_context(|| format!("data query failed for {}", spec.kind.table_name()))?;
    let rows = rows
        .iter()
        .map(row_to_json)
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryPage {
        total_records,
        total_pages: total_pages(total_records, per_page),
        page,
        per_page,
        columns: built.columns,
        rows,
    })
}

/// Materialize one SQLite row as a JSON object keyed by column name,
/// decoding by the value's storage class.
pub fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::new();
    for column in row.columns() {
        let ordinal = column.ordinal();
        let raw = row
            .try_get_raw(ordinal)
            .with_context(|| format!("failed to read column {}", column.name()))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(ordinal)?),
                "REAL" => Value::from(row.try_get::<f64, _>(ordinal)?),
                _ => Value::from(row.try_get::<String, _>(ordinal)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CellValue, SheetData};
    use crate::store::loader::load_period;
    use crate::store::memory_pool;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_projection_drops_surrogate_key() {
        let spec = QuerySpec::new(ReportKind::OutputResults);
        let built = build_query(&spec, &cols(&["id", "产品名称", "数量", "当期日期"]));
        assert_eq!(built.columns, cols(&["产品名称", "数量", "当期日期"]));
        assert!(built.data_sql.starts_with("SELECT \"产品名称\", \"数量\", \"当期日期\""));
    }

    #[test]
    fn test_unknown_fields_silently_dropped() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.fields = cols(&["数量", "没有的列"]);
        let built = build_query(&spec, &cols(&["id", "产品名称", "数量"]));
        assert_eq!(built.columns, cols(&["数量"]));
    }

    #[test]
    fn test_unknown_sort_field_dropped() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.sort = parse_sort("金额,date", "DESC,ASC");
        let built = build_query(&spec, &cols(&["id", "金额", "数量"]));
        assert!(built.data_sql.contains("ORDER BY \"金额\" DESC"));
        assert!(!built.data_sql.contains("date"));
    }

    #[test]
    fn test_multi_key_sort_keeps_priority_order() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.sort = parse_sort("数量,金额", "desc");
        let built = build_query(&spec, &cols(&["id", "金额", "数量"]));
        // Second direction missing: defaults to ascending.
        assert!(built.data_sql.contains("ORDER BY \"数量\" DESC, \"金额\" ASC"));
    }

    #[test]
    fn test_search_binds_one_param_per_column() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.search = Some("客户".to_string());
        let built = build_query(&spec, &cols(&["id", "客户名称", "备注", "当期日期"]));
        // id and the period column are excluded from the match set.
        assert_eq!(built.params, vec!["%客户%".to_string(); 2]);
        assert_eq!(built.count_sql.matches("LIKE ?").count(), 2);
        assert!(built.count_sql.contains(" OR "));
    }

    #[test]
    fn test_blank_search_means_no_filter() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.search = Some("   ".to_string());
        let built = build_query(&spec, &cols(&["id", "客户名称"]));
        assert!(built.params.is_empty());
        assert!(!built.count_sql.contains("WHERE"));
    }

    #[test]
    fn test_count_and_data_share_filter() {
        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.search = Some("x".to_string());
        let built = build_query(&spec, &cols(&["id", "客户名称", "备注"]));
        let where_part = built
            .count_sql
            .split_once("WHERE")
            .map(|(_, rest)| rest.to_string())
            .unwrap();
        assert!(built.data_sql.contains(&where_part));
    }

    #[test]
    fn test_total_pages_rounding() {
        assert_eq!(total_pages(105, 50), 3);
        assert_eq!(total_pages(100, 50), 2);
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(1, 50), 1);
    }

    #[test]
    fn test_parse_sort_pairs_positionally() {
        assert_eq!(
            parse_sort("a,b", "DESC,ASC"),
            vec![("a".to_string(), SortDir::Desc), ("b".to_string(), SortDir::Asc)]
        );
        assert_eq!(
            parse_sort("a", "sideways"),
            vec![("a".to_string(), SortDir::Asc)]
        );
        assert!(parse_sort("", "DESC").is_empty());
    }

    async fn seed_output_results(pool: &sqlx::SqlitePool, count: i64) {
        let sheet = SheetData {
            columns: cols(&["产品名称", "数量"]),
            rows: (0..count)
                .map(|i| {
                    vec![
                        CellValue::Text(format!("产品{:03}", i)),
                        CellValue::Integer(i),
                    ]
                })
                .collect(),
        };
        load_period(
            pool,
            ReportKind::OutputResults,
            "2024-06-01".parse().unwrap(),
            &sheet,
            &cols(&["产品名称", "数量"]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let pool = memory_pool().await;
        seed_output_results(&pool, 105).await;

        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.per_page = 50;
        spec.page = 3;
        spec.sort = vec![("数量".to_string(), SortDir::Asc)];

        let page = run_query(&pool, &spec).await.unwrap();
        assert_eq!(page.total_records, 105);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0]["数量"], Value::from(100));
    }

    #[tokio::test]
    async fn test_search_matches_substring() {
        let pool = memory_pool().await;
        seed_output_results(&pool, 20).await;

        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.search = Some("产品01".to_string());
        let page = run_query(&pool, &spec).await.unwrap();
        // 产品010 .. 产品019
        assert_eq!(page.total_records, 10);
    }

    #[tokio::test]
    async fn test_sort_descending() {
        let pool = memory_pool().await;
        seed_output_results(&pool, 5).await;

        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.sort = parse_sort("数量", "DESC");
        let page = run_query(&pool, &spec).await.unwrap();
        assert_eq!(page.rows[0]["数量"], Value::from(4));
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let pool = memory_pool().await;
        seed_output_results(&pool, 3).await;

        let mut spec = QuerySpec::new(ReportKind::OutputResults);
        spec.page = 9;
        let page = run_query(&pool, &spec).await.unwrap();
        assert_eq!(page.total_records, 3);
        assert!(page.rows.is_empty());
    }
}
