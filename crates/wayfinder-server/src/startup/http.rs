//! HTTP server setup

use actix_web::{
    App, HttpServer,
    dev::Server,
    middleware::{Compress, Logger},
    web,
};
use wayfinder_registry::Registry;

use crate::api::route::{json_config, query_config, registry_routes};

/// Creates and binds the registry HTTP server.
///
/// Process signals are left to the caller so the registry can be closed
/// after the server drains.
pub fn registry_server(registry: Registry, address: String, port: u16) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Compress::default())
            .app_data(web::Data::new(registry.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .service(registry_routes())
    })
    .disable_signals()
    .bind((address, port))?
    .run())
}
