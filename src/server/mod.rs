//! HTTP surface: actix-web app serving the query, mutation and import
//! endpoints over a shared connection pool.

pub mod api;
pub mod error;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Route table, shared between the real server and test harnesses.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(api::data)
        .service(api::add)
        .service(api::update)
        .service(api::delete)
        .service(api::export)
        .service(api::import);
}

pub async fn run(listen: &str, pool: SqlitePool) -> Result<()> {
    log::info!("listening on http://{}", listen);
    let data = web::Data::new(pool);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(listen)
        .with_context(|| format!("failed to bind {}", listen))?
        .run()
        .await
        .context("server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_pool;
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    macro_rules! test_app {
        () => {{
            let pool = memory_pool().await;
            test::init_service(
                App::new()
                    .app_data(web::Data::new(pool))
                    .configure(configure),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn test_data_rejects_unknown_table() {
        let app = test_app!();
        let request = test::TestRequest::get()
            .uri("/api/data?table=users")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_add_then_query() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/add")
            .set_json(json!({
                "table": "output_results",
                "fields": { "产品名称": "维生素C", "数量": 7 }
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert!(body["id"].as_i64().unwrap() > 0);

        let request = test::TestRequest::get()
            .uri("/api/data?table=output_results&per_page=10")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["total_records"], json!(1));
        assert_eq!(body["rows"][0]["产品名称"], json!("维生素C"));
    }

    #[actix_web::test]
    async fn test_update_missing_id_is_bad_request() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/update")
            .set_json(json!({
                "table": "output_results",
                "fields": { "数量": 1 }
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_delete_unknown_id_is_bad_request() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/delete")
            .set_json(json!({ "table": "output_results", "id": 424242 }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_export_empty_id_set_is_bad_request() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/export")
            .set_json(json!({ "table": "output_results", "ids": [] }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_export_returns_spreadsheet() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/add")
            .set_json(json!({
                "table": "output_results",
                "fields": { "备注": "导出测试" }
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        let id = body["id"].as_i64().unwrap();

        let request = test::TestRequest::post()
            .uri("/api/export")
            .set_json(json!({ "table": "output_results", "ids": [id] }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("spreadsheetml"));
    }

    #[actix_web::test]
    async fn test_import_rejects_empty_path_list() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/import")
            .set_json(json!({ "paths": [] }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_import_reports_per_file_failures() {
        let app = test_app!();
        let request = test::TestRequest::post()
            .uri("/api/import")
            .set_json(json!({ "paths": ["/nonexistent/别的文件.xlsx"] }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["results"][0]["ok"], json!(false));
    }
}
