//! Wayfinder Server - HTTP front end of the service registry
//!
//! This crate provides:
//! - The registry HTTP API
//! - Configuration loading
//! - Logging and graceful shutdown

pub mod api;
pub mod error;
pub mod model;
pub mod startup;
