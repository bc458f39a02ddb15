// Error handling for the Wayfinder HTTP layer
// Maps registry errors and request validation failures onto the response envelope

use std::fmt::{Display, Formatter};

use actix_web::HttpResponse;

pub use wayfinder_common::error::{
    BACKEND_UNAVAILABLE, DATA_ACCESS_ERROR, INSTANCE_NOT_FOUND, PARAMETER_MISSING,
    PARAMETER_VALIDATE_ERROR, PARSING_DATA_FAILED, SERVER_ERROR, SUCCESS,
};
pub use wayfinder_common::{ErrorCode, RegistryError};

use crate::model::response as common;

/// Request-level failures raised before the registry is consulted
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("required parameter '{0}' is missing")]
    ParameterMissing(String),

    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("malformed request body: {0}")]
    Malformed(String),
}

// Local wrapper for application errors to implement actix-web error handling
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<RegistryError> for AppError {
    fn from(value: RegistryError) -> Self {
        AppError {
            inner: value.into(),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(value: RequestError) -> Self {
        AppError {
            inner: value.into(),
        }
    }
}

impl AppError {
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// HTTP status and envelope code for this error
    pub fn status_and_code(&self) -> (u16, ErrorCode<'static>) {
        if let Some(e) = self.downcast_ref::<RegistryError>() {
            match e {
                RegistryError::NotFound(_) => (404, INSTANCE_NOT_FOUND),
                RegistryError::BackendUnavailable(_) => (503, BACKEND_UNAVAILABLE),
                RegistryError::Misconfiguration(_) => (500, SERVER_ERROR),
                RegistryError::Serialization(_) => (500, DATA_ACCESS_ERROR),
            }
        } else if let Some(e) = self.downcast_ref::<RequestError>() {
            match e {
                RequestError::ParameterMissing(_) => (400, PARAMETER_MISSING),
                RequestError::IllegalArgument(_) => (400, PARAMETER_VALIDATE_ERROR),
                RequestError::Malformed(_) => (400, PARSING_DATA_FAILED),
            }
        } else {
            (500, SERVER_ERROR)
        }
    }
}

impl actix_web::error::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        let (status, _) = self.status_and_code();
        actix_web::http::StatusCode::from_u16(status)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let (status, code) = self.status_and_code();
        if status >= 500 {
            tracing::warn!(status, error = %self.inner, "Request failed");
        }
        common::Result::<String>::http_response(status, code.code, self.inner.to_string(), String::new())
    }
}
