//! Unified application error model and mapping helpers.
//! Every fallible operation reachable from an HTTP handler ends in an `AppError`,
//! which knows its status code and renders the JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;

pub const VALIDATION_ERROR: &str = "validation_error";
pub const DUPLICATE_EMAIL: &str = "duplicate_email";
pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const NOT_FOUND: &str = "not_found";
pub const ALREADY_JOINED: &str = "already_joined";
pub const INTERNAL: &str = "internal_error";

/// Message returned to clients for any internal failure. The cause is only logged.
const OPAQUE_INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::UserInput { code: VALIDATION_ERROR.into(), message: msg.into() }
    }

    pub fn duplicate_email() -> Self {
        AppError::user(DUPLICATE_EMAIL, "User already exists")
    }

    /// Same code and message whether the email is unknown or the password is wrong.
    pub fn invalid_credentials() -> Self {
        AppError::user(INVALID_CREDENTIALS, "Invalid email or password")
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Auth { code: UNAUTHORIZED.into(), message: msg.into() }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        AppError::NotFound { code: NOT_FOUND.into(), message: format!("{} not found", what.into()) }
    }

    pub fn already_joined() -> Self {
        AppError::user(ALREADY_JOINED, "User already joined this event")
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        AppError::Internal { code: INTERNAL.into(), message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::NotFound { .. } => 404,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: INTERNAL.into(), message: format!("{:#}", err) }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::storage(format!("io error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self {
            AppError::Internal { message, .. } => {
                error!(code = self.code_str(), "request failed: {}", message);
                OPAQUE_INTERNAL_MESSAGE
            }
            other => other.message(),
        };
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
