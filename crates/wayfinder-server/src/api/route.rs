//! Registry API routing configuration

use actix_web::{Scope, error, web};

use crate::error::{AppError, RequestError};

use super::{catalog, instance};

/// Create the registry routes under `/v1/registry`
pub fn registry_routes() -> Scope {
    web::scope("/v1/registry")
        .service(
            web::scope("/services")
                .service(instance::register_instance)
                .service(instance::list_instances)
                .service(instance::get_instance)
                .service(instance::deregister_instance)
                .service(instance::update_health)
                .service(instance::refresh_ttl),
        )
        .service(web::scope("/healthy").service(instance::list_healthy_instances))
        .service(
            web::scope("/catalog")
                .service(catalog::list_catalog)
                .service(catalog::catalog_summary),
        )
}

/// Report malformed JSON bodies in the response envelope
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| malformed(err.to_string()))
}

/// Report malformed query strings in the response envelope
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| malformed(err.to_string()))
}

fn malformed(message: String) -> error::Error {
    AppError::from(RequestError::Malformed(message)).into()
}
