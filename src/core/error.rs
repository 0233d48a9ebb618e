//! Typed error handling for the request pipeline
//!
//! Every handler step below the dispatcher returns a [`ServerError`] on
//! failure; the dispatcher is the single place that turns one into an HTTP
//! response. No component below it talks HTTP.
//!
//! # Error Categories
//!
//! - [`ProtocolError`]: malformed method/path/body, recovered locally (400/404)
//! - [`AuthError`]: bad credentials or insufficient permission (401/403)
//! - `NotFound`: unknown resource or id (404)
//! - [`StoreError`]: persistence failure (500, detail logged, never sent)

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::core::store::ResourceId;

/// The main error type for request handling
#[derive(Debug)]
pub enum ServerError {
    /// Malformed request shape (body, field names, value types, routes)
    Protocol(ProtocolError),

    /// Failed authentication or authorization
    Auth(AuthError),

    /// Resource instance does not exist
    NotFound { entity: String, id: ResourceId },

    /// Underlying store failure
    Store(StoreError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Protocol(e) => write!(f, "{}", e),
            ServerError::Auth(e) => write!(f, "{}", e),
            ServerError::NotFound { entity, id } => {
                write!(f, "{} with id {} not found", entity, id)
            }
            ServerError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Protocol(e) => Some(e),
            ServerError::Auth(e) => Some(e),
            ServerError::NotFound { .. } => None,
            ServerError::Store(e) => Some(e),
        }
    }
}

/// Error body sent on the wire
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ServerError {
    /// The HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Protocol(e) => e.status_code(),
            ServerError::Auth(e) => e.status_code(),
            ServerError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Protocol(e) => e.error_code(),
            ServerError::Auth(e) => e.error_code(),
            ServerError::NotFound { .. } => "NOT_FOUND",
            ServerError::Store(_) => "STORE_ERROR",
        }
    }

    /// Convert to the wire error body.
    ///
    /// Store failures carry no internal detail to the client; the real
    /// message goes to the log at the dispatch layer.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ServerError::Store(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            code: self.error_code().to_string(),
            message,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

/// A specialized Result type for request handling
pub type ServerResult<T> = Result<T, ServerError>;

// =============================================================================
// Protocol Errors
// =============================================================================

/// Malformed requests: recovered locally, never crash the process
#[derive(Debug)]
pub enum ProtocolError {
    /// Body is not valid JSON, or not the JSON shape the route requires
    MalformedBody { message: String },

    /// No route matches the method/path combination
    UnknownRoute { method: String, path: String },

    /// Payload names a field the entity does not declare
    UnknownField { entity: String, field: String },

    /// Payload value does not fit the field's declared type or cardinality
    ValueMismatch { field: String, message: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedBody { message } => {
                write!(f, "malformed request body: {}", message)
            }
            ProtocolError::UnknownRoute { method, path } => {
                write!(f, "no route for {} {}", method, path)
            }
            ProtocolError::UnknownField { entity, field } => {
                write!(f, "{} has no field '{}'", entity, field)
            }
            ProtocolError::ValueMismatch { field, message } => {
                write!(f, "invalid value for field '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProtocolError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            ProtocolError::UnknownRoute { .. } => StatusCode::NOT_FOUND,
            ProtocolError::UnknownField { .. } => StatusCode::BAD_REQUEST,
            ProtocolError::ValueMismatch { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedBody { .. } => "MALFORMED_BODY",
            ProtocolError::UnknownRoute { .. } => "UNKNOWN_ROUTE",
            ProtocolError::UnknownField { .. } => "UNKNOWN_FIELD",
            ProtocolError::ValueMismatch { .. } => "VALUE_MISMATCH",
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        ServerError::Protocol(err)
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Failed authentication or authorization
#[derive(Debug)]
pub enum AuthError {
    /// Client or user credentials did not verify.
    ///
    /// Deliberately carries no detail: the response shape is identical no
    /// matter which credential was wrong.
    LoginFailed,

    /// The session lacks permission for the attempted action
    Forbidden { action: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::LoginFailed => write!(f, "login failed"),
            AuthError::Forbidden { action } => write!(f, "not permitted to {}", action),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::LoginFailed => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::LoginFailed => "LOGIN_FAILED",
            AuthError::Forbidden { .. } => "FORBIDDEN",
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(err: AuthError) -> Self {
        ServerError::Auth(err)
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Failures of the underlying persistence layer
#[derive(Debug)]
pub enum StoreError {
    /// The backend reported an error
    Backend { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend { message } => write!(f, "store error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        ServerError::Store(err)
    }
}

/// Store trait methods surface `anyhow::Error`; inside the pipeline every
/// such failure is a store failure.
impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Store(StoreError::Backend {
            message: err.to_string(),
        })
    }
}
