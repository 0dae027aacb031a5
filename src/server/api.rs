//! JSON API handlers over the query builder, mutation service and
//! ingestion pipeline.

use std::path::PathBuf;

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;

use super::error::ApiError;
use crate::export::write_workbook;
use crate::ingest::ingest_file;
use crate::report::ReportKind;
use crate::store::mutation;
use crate::store::query::{QuerySpec, parse_fields, parse_sort, run_query};

fn resolve_table(name: &str) -> Result<ReportKind, ApiError> {
    ReportKind::from_table_name(name)
        .ok_or_else(|| ApiError::bad_request(format!("unknown table: {}", name)))
}

/// Accept the primary key as a JSON number or a numeric string; absence is
/// a request error, not a no-op.
fn require_id(id: Option<&Value>) -> Result<i64, ApiError> {
    let id = id.ok_or_else(|| ApiError::bad_request("missing primary key value"))?;
    match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::bad_request("primary key must be an integer"))
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    table: String,
    page: Option<u32>,
    per_page: Option<u32>,
    sort_field: Option<String>,
    sort_order: Option<String>,
    search: Option<String>,
    fields: Option<String>,
}

#[get("/api/data")]
pub async fn data(
    pool: web::Data<SqlitePool>,
    params: web::Query<DataParams>,
) -> Result<HttpResponse, ApiError> {
    let mut spec = QuerySpec::new(resolve_table(&params.table)?);
    if let Some(page) = params.page {
        spec.page = page;
    }
    if let Some(per_page) = params.per_page {
        spec.per_page = per_page;
    }
    if let Some(fields) = &params.fields {
        spec.fields = parse_fields(fields);
    }
    if let Some(sort_field) = &params.sort_field {
        spec.sort = parse_sort(sort_field, params.sort_order.as_deref().unwrap_or(""));
    }
    spec.search = params.search.clone();

    let page = run_query(&pool, &spec).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    table: String,
    fields: Map<String, Value>,
}

#[post("/api/add")]
pub async fn add(
    pool: web::Data<SqlitePool>,
    request: web::Json<AddRequest>,
) -> Result<HttpResponse, ApiError> {
    let kind = resolve_table(&request.table)?;
    if request.fields.is_empty() {
        return Err(ApiError::bad_request("no fields provided"));
    }
    let id = mutation::insert_row(&pool, kind, &request.fields).await?;
    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    table: String,
    id: Option<Value>,
    fields: Map<String, Value>,
}

#[post("/api/update")]
pub async fn update(
    pool: web::Data<SqlitePool>,
    request: web::Json<UpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let kind = resolve_table(&request.table)?;
    let id = require_id(request.id.as_ref())?;
    if request.fields.is_empty() {
        return Err(ApiError::bad_request("no fields provided"));
    }
    let updated = mutation::update_row(&pool, kind, id, &request.fields).await?;
    if updated == 0 {
        return Err(ApiError::bad_request(format!("no row with id {}", id)));
    }
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    table: String,
    id: Option<Value>,
}

#[post("/api/delete")]
pub async fn delete(
    pool: web::Data<SqlitePool>,
    request: web::Json<DeleteRequest>,
) -> Result<HttpResponse, ApiError> {
    let kind = resolve_table(&request.table)?;
    let id = require_id(request.id.as_ref())?;
    let deleted = mutation::delete_row(&pool, kind, id).await?;
    if deleted == 0 {
        return Err(ApiError::bad_request(format!("no row with id {}", id)));
    }
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    table: String,
    ids: Vec<i64>,
}

#[post("/api/export")]
pub async fn export(
    pool: web::Data<SqlitePool>,
    request: web::Json<ExportRequest>,
) -> Result<HttpResponse, ApiError> {
    let kind = resolve_table(&request.table)?;
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("no rows selected for export"));
    }
    let (columns, rows) = mutation::export_rows(&pool, kind, &request.ids).await?;
    let buffer = write_workbook(kind.table_name(), &columns, &rows)?;
    Ok(HttpResponse::Ok()
        .content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}_export.xlsx\"", kind.table_name()),
        ))
        .body(buffer))
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ImportResult {
    file: String,
    ok: bool,
    message: String,
}

/// Ingest already-uploaded files by local path. The upload form itself is
/// an external collaborator; it hands paths to this endpoint.
#[post("/api/import")]
pub async fn import(
    pool: web::Data<SqlitePool>,
    request: web::Json<ImportRequest>,
) -> Result<HttpResponse, ApiError> {
    if request.paths.is_empty() {
        return Err(ApiError::bad_request("no files given"));
    }
    let mut results = Vec::new();
    for path in &request.paths {
        let file = path.display().to_string();
        match ingest_file(&pool, path).await {
            Ok(report) => results.push(ImportResult {
                file,
                ok: true,
                message: format!(
                    "imported {} rows into {} for {}",
                    report.inserted,
                    report.kind.table_name(),
                    report.period
                ),
            }),
            Err(err) => results.push(ImportResult {
                file,
                ok: false,
                message: format!("{:#}", err),
            }),
        }
    }
    Ok(HttpResponse::Ok().json(json!({ "results": results })))
}
