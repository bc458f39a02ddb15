//! Instance API handlers
//!
//! - POST /v1/registry/services - Register instance
//! - GET /v1/registry/services - List instances by name and tags
//! - GET /v1/registry/services/{id} - Get instance
//! - DELETE /v1/registry/services/{id} - Deregister instance
//! - PUT /v1/registry/services/{id}/health - Update health
//! - PUT /v1/registry/services/{id}/ttl - Refresh TTL
//! - GET /v1/registry/healthy - List passing instances by name and tags

use actix_web::{HttpResponse, delete, get, post, put, web};
use wayfinder_registry::{HealthStatus, Registry};

use crate::error::AppError;
use crate::model::response::Result;

use super::model::{HealthRequest, ListQuery, RegisterRequest, TtlRequest};

#[post("")]
pub async fn register_instance(
    registry: web::Data<Registry>,
    body: web::Json<RegisterRequest>,
) -> std::result::Result<HttpResponse, AppError> {
    let instance = body.into_inner().into_instance()?;
    let (id, name, ttl) = (instance.id.clone(), instance.name.clone(), instance.ttl);

    registry.register(instance).await?;

    tracing::info!(
        id = %id,
        name = %name,
        ttl = ttl,
        "Instance registered"
    );
    Ok(Result::<String>::http_success("ok".to_string()))
}

#[get("")]
pub async fn list_instances(
    registry: web::Data<Registry>,
    query: web::Query<ListQuery>,
) -> std::result::Result<HttpResponse, AppError> {
    let (name, tags) = query.criteria()?;
    let instances = registry.discover(name, &tags, false).await?;
    Ok(Result::<String>::http_success(instances))
}

#[get("/{id}")]
pub async fn get_instance(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> std::result::Result<HttpResponse, AppError> {
    let instance = registry.get(&id).await?;
    Ok(Result::<String>::http_success(instance))
}

#[delete("/{id}")]
pub async fn deregister_instance(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> std::result::Result<HttpResponse, AppError> {
    registry.deregister(&id).await?;
    Ok(Result::<String>::http_success("ok".to_string()))
}

#[put("/{id}/health")]
pub async fn update_health(
    registry: web::Data<Registry>,
    id: web::Path<String>,
    body: web::Json<HealthRequest>,
) -> std::result::Result<HttpResponse, AppError> {
    let health = HealthStatus::from(body.into_inner());
    let status = health.status;

    registry.update_health(&id, health).await?;

    tracing::info!(id = %id, status = %status, "Instance health status updated");
    Ok(Result::<String>::http_success("ok".to_string()))
}

#[put("/{id}/ttl")]
pub async fn refresh_ttl(
    registry: web::Data<Registry>,
    id: web::Path<String>,
    body: web::Json<TtlRequest>,
) -> std::result::Result<HttpResponse, AppError> {
    registry.refresh_ttl(&id, body.ttl).await?;
    tracing::debug!(id = %id, ttl = body.ttl, "Instance TTL refreshed");
    Ok(Result::<String>::http_success("ok".to_string()))
}

#[get("")]
pub async fn list_healthy_instances(
    registry: web::Data<Registry>,
    query: web::Query<ListQuery>,
) -> std::result::Result<HttpResponse, AppError> {
    let (name, tags) = query.criteria()?;
    let instances = registry.discover(name, &tags, true).await?;
    Ok(Result::<String>::http_success(instances))
}
