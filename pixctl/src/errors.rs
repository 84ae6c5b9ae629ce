use crate::{
    assets::AssetError, db::errors::DbError, ledger::LedgerError, payment_providers::PaymentError, projects::ProjectError,
    transformations::TransformationError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// A project that is missing or owned by someone else
    #[error("Project not found")]
    NotFoundOrForbidden,

    /// An optional integration, such as the payment provider, is switched off
    #[error("{feature} is not configured")]
    NotConfigured { feature: &'static str },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// Stable reason code, e.g. `insufficient_credits`
    pub error: &'static str,
    pub message: String,
}

impl From<ProjectError> for Error {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFoundOrForbidden => Error::NotFoundOrForbidden,
            ProjectError::AlreadyApplied(kind) => Error::Transformation(TransformationError::AlreadyApplied(kind)),
            ProjectError::Database(e) => Error::Database(e),
        }
    }
}

impl Error {
    /// Stable reason code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "unauthorized",
            Error::BadRequest { .. } => "bad_request",
            Error::NotFound { .. } => "not_found",
            Error::NotFoundOrForbidden => "not_found_or_forbidden",
            Error::NotConfigured { .. } => "not_configured",
            Error::Ledger(e) => e.code(),
            Error::Transformation(e) => match e {
                TransformationError::EmptyInput => "empty_input",
                TransformationError::InvalidLabel(_) => "invalid_label",
                TransformationError::UnknownKind(_) => "bad_request",
                TransformationError::AlreadyApplied(_) => "transformation_already_applied",
                TransformationError::NotFoundOrForbidden => "not_found_or_forbidden",
                TransformationError::Ledger(e) => e.code(),
                TransformationError::Database(_) => "internal_error",
            },
            Error::Payment(e) => e.code(),
            Error::Asset(_) | Error::Internal { .. } | Error::Database(_) | Error::Other(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } | Error::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            Error::NotConfigured { .. } => StatusCode::NOT_IMPLEMENTED,
            Error::Ledger(e) => ledger_status(e),
            Error::Transformation(e) => match e {
                TransformationError::EmptyInput | TransformationError::InvalidLabel(_) | TransformationError::UnknownKind(_) => {
                    StatusCode::BAD_REQUEST
                }
                TransformationError::AlreadyApplied(_) => StatusCode::CONFLICT,
                TransformationError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
                TransformationError::Ledger(e) => ledger_status(e),
                TransformationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Payment(e) => StatusCode::from(e),
            Error::Asset(_) | Error::Internal { .. } | Error::Database(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::NotFoundOrForbidden => "Project not found".to_string(),
            Error::NotConfigured { .. } => self.to_string(),
            Error::Ledger(e) => ledger_message(e),
            Error::Transformation(e) => match e {
                TransformationError::Ledger(e) => ledger_message(e),
                TransformationError::Database(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Error::Payment(e) => e.user_message(),
            Error::Asset(_) | Error::Internal { .. } | Error::Database(_) | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidAmount => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::UserNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_message(err: &LedgerError) -> String {
    match err {
        LedgerError::Database(_) => "Internal server error".to_string(),
        LedgerError::UserNotFound(_) => "User not found".to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::NotConfigured { .. } => {
                tracing::warn!("{}", self);
            }
            _ if self.is_internal() => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Payment(_) => {
                tracing::warn!("Payment error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            success: false,
            error: self.code(),
            message: self.user_message(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
