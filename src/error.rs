//! # Error Handling
//!
//! Repository errors for the application store and a unified API error for
//! the HTTP surface, rendered as problem+json with trace ID propagation.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::telemetry;

/// Errors raised by the application store and its repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("application store lock is poisoned")]
    StorePoisoned,
    #[error("tenant '{0}' does not exist")]
    TenantNotFound(String),
    #[error("tenant '{0}' already exists")]
    TenantAlreadyExists(String),
    #[error("tenant id '{0}' is invalid, expected 1-50 alphanumeric characters")]
    InvalidTenantId(String),
    #[error("group '{0}' does not exist")]
    GroupNotFound(String),
    #[error("third-party API configuration '{0}' does not exist")]
    ConfigurationNotFound(Uuid),
    #[error("snapshot persistence failed: {0}")]
    Snapshot(String),
}

impl RepositoryError {
    pub(crate) fn snapshot_error(err: impl std::fmt::Display) -> Self {
        RepositoryError::Snapshot(err.to_string())
    }
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract current trace ID from the active request context (falls back
    /// to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

// Error mappers for common sources

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::TenantNotFound(_)
            | RepositoryError::GroupNotFound(_)
            | RepositoryError::ConfigurationNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", &error.to_string())
            }
            RepositoryError::TenantAlreadyExists(_) => {
                Self::new(StatusCode::CONFLICT, "CONFLICT", &error.to_string())
            }
            RepositoryError::InvalidTenantId(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                &error.to_string(),
            ),
            RepositoryError::StorePoisoned | RepositoryError::Snapshot(_) => {
                tracing::error!(error = %error, "Application store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Application store failure",
                )
            }
        }
    }
}

/// Create a not found error (404)
pub fn not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

/// Create a broker upstream error (502) with status metadata
pub fn broker_unreachable(status: Option<u16>, body: Option<String>) -> ApiError {
    let body_snippet = body.map(|b| {
        if b.chars().count() > 200 {
            let truncated: String = b.chars().take(200).collect();
            format!("{}...", truncated)
        } else {
            b
        }
    });

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "BROKER_UNREACHABLE",
        "The context broker did not answer the version probe",
    )
    .with_details(json!({
        "status": status,
        "body_snippet": body_snippet,
    }))
}
