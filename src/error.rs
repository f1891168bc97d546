//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Invalid table model, detected before any request is served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("table {0} has no primary key")]
    MissingPrimaryKey(String),
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("settings: {0}")]
    Settings(String),
}

/// Which storage rule rejected a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    /// Constraint name as reported by the engine, when known.
    pub constraint: Option<String>,
}

impl ConstraintViolation {
    pub fn new(kind: ConstraintKind) -> Self {
        ConstraintViolation { kind, constraint: None }
    }

    pub fn named(kind: ConstraintKind, constraint: impl Into<String>) -> Self {
        ConstraintViolation {
            kind,
            constraint: Some(constraint.into()),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(name) => write!(f, "{} constraint {} violated", self.kind, name),
            None => write!(f, "{} constraint violated", self.kind),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Constraint(ConstraintViolation),
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("storage: {0}")]
    Storage(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The constraint violation carried by this error, if any.
    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            AppError::Constraint(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_constraint(&self, kind: ConstraintKind) -> bool {
        self.constraint().map(|c| c.kind == kind).unwrap_or(false)
    }
}

/// Constraint failures are split out of `sqlx::Error` so callers can match on them
/// without knowing the engine's error codes.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let kind = match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                sqlx::error::ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                sqlx::error::ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                sqlx::error::ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                _ => None,
            };
            if let Some(kind) = kind {
                return AppError::Constraint(ConstraintViolation {
                    kind,
                    constraint: db.constraint().map(str::to_owned),
                });
            }
        }
        AppError::Db(e)
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn error_response(status: StatusCode, code: &str, message: String, details: Option<serde_json::Value>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
            details,
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            AppError::Validation { field, message } => error_response(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("{}: {}", field, message),
                Some(serde_json::json!({ "field": field })),
            ),
            AppError::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, "bad_request", message, None),
            AppError::Unauthorized => error_response(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "authentication required".into(),
                None,
            ),
            AppError::Constraint(c) => {
                tracing::debug!(constraint = %c, "unhandled constraint violation");
                error_response(
                    StatusCode::CONFLICT,
                    "conflict",
                    format!("{} constraint violated", c.kind),
                    None,
                )
            }
            e @ (AppError::Config(_) | AppError::Db(_) | AppError::Storage(_)) => {
                tracing::error!(error = %e, "request failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".into(),
                    None,
                )
            }
        }
    }
}
