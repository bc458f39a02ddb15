//! Wayfinder Registry - Service registration and discovery
//!
//! This crate provides:
//! - The service instance and health models
//! - A storage contract with in-memory and Redis backends
//! - Tag and health aware discovery queries
//! - TTL expiry with a periodic sweeper

pub mod config;
pub mod memory;
pub mod model;
pub mod redis;
pub mod registry;
pub mod storage;
pub mod sweeper;

// Re-export commonly used types
pub use config::{RedisConfig, RegistryConfig};
pub use memory::MemoryStorage;
pub use model::{HealthState, HealthStatus, ServiceInstance, ServiceSummary};
pub use redis::RedisStorage;
pub use registry::{Registry, create_storage};
pub use storage::{Storage, retain_healthy, retain_matching};
pub use sweeper::ExpirySweeper;
pub use wayfinder_common::{RegistryError, Result};
