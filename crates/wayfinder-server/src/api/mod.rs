//! HTTP API for the service registry

pub mod catalog;
pub mod instance;
pub mod model;
pub mod route;
