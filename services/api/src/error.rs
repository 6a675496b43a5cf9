//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered to HTTP clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shop_core::{CoreError, PortError};
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A rejected shop operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while applying schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller is authenticated but not allowed to do this.
    #[error("Not authorized to access this route")]
    Forbidden,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => core_status(err),
            ApiError::Port(err) => port_status(err),
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::DuplicateAccount
        | CoreError::NoPendingRegistration
        | CoreError::InvalidOrExpiredOtp
        | CoreError::InsufficientStock { .. }
        | CoreError::InvalidQuantity
        | CoreError::Validation(_)
        | CoreError::AmountOutOfRange(_)
        | CoreError::EmptyCart
        | CoreError::OrderAlreadyDelivered => StatusCode::BAD_REQUEST,
        CoreError::ProductNotFound
        | CoreError::LineItemNotFound(_)
        | CoreError::OrderNotFound => StatusCode::NOT_FOUND,
        CoreError::InvalidCredentials | CoreError::EmailNotVerified => StatusCode::UNAUTHORIZED,
        CoreError::CartContention => StatusCode::CONFLICT,
        CoreError::EmailDispatchFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CoreError::Port(err) => port_status(err),
    }
}

fn port_status(err: &PortError) -> StatusCode {
    match err {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't expose internal error details to clients
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            match &self {
                ApiError::Core(CoreError::EmailDispatchFailure(_)) => self.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            match &self {
                ApiError::Port(PortError::NotFound(_))
                | ApiError::Core(CoreError::Port(PortError::NotFound(_))) => {
                    "Not found".to_string()
                }
                ApiError::Port(PortError::Unauthorized) => {
                    "Not authorized to access this route".to_string()
                }
                _ => self.to_string(),
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
