use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    cache::{CacheError, FetchError},
    infra::error::InfraError,
};

/// Diagnostic attached to failed responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("range starting at {start} is past the end of a {total_length}-byte resource")]
    RangeNotSatisfiable { start: u64, total_length: u64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Cache(CacheError::InvalidRange { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Cache(CacheError::Capacity { .. }) => StatusCode::INSUFFICIENT_STORAGE,
            AppError::Cache(CacheError::Fetch(_)) | AppError::Infra(InfraError::Upstream(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Cache(CacheError::Abandoned) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Cache(CacheError::WaitTimeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Infra(InfraError::Configuration { .. })
            | AppError::Infra(InfraError::Telemetry(_))
            | AppError::Infra(InfraError::Io(_))
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Cache(CacheError::InvalidRange { .. }) | AppError::Validation(_) => {
                "Request could not be processed"
            }
            AppError::RangeNotSatisfiable { .. } => "Requested range not satisfiable",
            AppError::Cache(CacheError::Capacity { .. }) => "Range exceeds cache capacity",
            AppError::Cache(CacheError::Fetch(FetchError::RangeUnsupported))
            | AppError::Infra(InfraError::Upstream(FetchError::RangeUnsupported)) => {
                "Upstream does not support byte ranges"
            }
            AppError::Cache(CacheError::Fetch(_)) | AppError::Infra(InfraError::Upstream(_)) => {
                "Upstream request failed"
            }
            AppError::Cache(CacheError::Abandoned) => "Service temporarily unavailable",
            AppError::Cache(CacheError::WaitTimeout) => "Upstream request timed out",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
