//! Error types and error codes for Wayfinder
//!
//! This module defines:
//! - `RegistryError`: the error taxonomy shared by every storage backend
//! - `ErrorCode`: structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Registry error taxonomy
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The referenced instance id is not registered
    #[error("instance '{0}' not found")]
    NotFound(String),

    /// The storage backend could not be reached, timed out, or is closed
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The registry could not be constructed from the given configuration
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// A stored record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RegistryError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable(cause.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Transient errors are worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const INSTANCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 21003,
    message: "instance not found",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};

pub const BACKEND_UNAVAILABLE: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "backend unavailable",
};

pub const PARSING_DATA_FAILED: ErrorCode<'static> = ErrorCode {
    code: 100004,
    message: "Failed to parse data",
};
