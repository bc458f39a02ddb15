//! Wayfinder Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Wayfinder components:
//! - Error taxonomy and error codes
//! - Utility functions
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{ErrorCode, RegistryError, Result};
pub use utils::is_valid;

/// Backend selector for the process-local store
pub const BACKEND_MEMORY: &str = "memory";

/// Backend selector for the Redis-backed durable store
pub const BACKEND_REDIS: &str = "redis";

/// Default key prefix for records in the durable store
pub const DEFAULT_KEY_PREFIX: &str = "wayfinder:";
