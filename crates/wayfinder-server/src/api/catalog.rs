//! Catalog API handlers
//!
//! - GET /v1/registry/catalog - All instances grouped by service name
//! - GET /v1/registry/catalog/summary - Instance counts per service

use actix_web::{HttpResponse, get, web};
use wayfinder_registry::Registry;

use crate::error::AppError;
use crate::model::response::Result;

#[get("")]
pub async fn list_catalog(
    registry: web::Data<Registry>,
) -> std::result::Result<HttpResponse, AppError> {
    let catalog = registry.list_all().await?;
    Ok(Result::<String>::http_success(catalog))
}

#[get("/summary")]
pub async fn catalog_summary(
    registry: web::Data<Registry>,
) -> std::result::Result<HttpResponse, AppError> {
    let summary = registry.summary().await?;
    Ok(Result::<String>::http_success(summary))
}
