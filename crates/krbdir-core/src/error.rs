//! Error types for principal administration.
//!
//! This module provides the stable error taxonomy surfaced to callers, the mapping from
//! low-level administration-service statuses onto it, and the human-readable renderer.

use serde::Serialize;
use thiserror::Error;

/// Main error type for directory administration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Bad credentials, missing secret or insufficient permission
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Principal not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Principal already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Principal realm does not match the service realm
    #[error("Bad realm: {0}")]
    BadRealm(String),

    /// Malformed principal identity or realm data
    #[error("Bad data: {0}")]
    BadData(String),

    /// The principal store is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Mask or field contract violation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport-level failure talking to the administration service
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Anything the taxonomy does not classify
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Specialized result type for directory administration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Low-level statuses reported by a real administration service.
///
/// These mirror the failure vocabulary of a kadmin-style server and are collapsed onto
/// [`Error`] by [`Error::from_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStatus {
    /// Not permitted to read principals
    AuthGet,
    /// Not permitted to add principals
    AuthAdd,
    /// Not permitted to modify principals
    AuthModify,
    /// Not permitted to delete principals
    AuthDelete,
    /// Generic insufficient privilege
    AuthInsufficient,
    /// Not permitted to list principals
    AuthList,
    /// Not permitted to change passwords
    AuthChangePassword,
    /// Not permitted to set keys
    AuthSetKey,
    /// Password rejected by quality checks
    BadPassword,
    /// GSS-API failure during the exchange
    GssError,
    /// Password was used before
    PasswordReuse,
    /// Password changed too recently
    PasswordTooSoon,
    /// Invalid field mask
    BadMask,
    /// Invalid password class
    BadClass,
    /// Invalid password length
    BadLength,
    /// Invalid policy
    BadPolicy,
    /// Invalid principal
    BadPrincipal,
    /// Invalid auxiliary attributes
    BadAuxAttr,
    /// Invalid minimum password life
    BadMinPassLife,
    /// Required configuration parameters are missing
    MissingConfParams,
    /// RPC transport failure
    RpcError,
    /// Principal does not exist
    UnknownPrincipal,
    /// Principal already exists
    Duplicate,
    /// Neither password nor key material supplied
    MissingCredentials,
    /// The admin principal is not present in the keytab
    KeytabEntryNotFound,
    /// Any other numeric status
    Other(i64),
}

/// Structured error response handed to the value-marshalling boundary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the symbolic error code for this error kind.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::AuthError(_) => "AUTH_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::BadRealm(_) => "BAD_REALM",
            Self::BadData(_) => "BAD_DATA",
            Self::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Returns the stable numeric administration-service code for this error kind.
    #[must_use]
    pub const fn service_code(&self) -> i64 {
        match self {
            Self::ConfigurationError(_) => 1,
            Self::AuthError(_) => 2,
            Self::NotFound(_) => 3,
            Self::AlreadyExists(_) => 4,
            Self::BadRealm(_) => 5,
            Self::BadData(_) => 6,
            Self::CapacityExceeded(_) => 7,
            Self::InvalidInput(_) => 8,
            Self::ConnectionError(_) => 9,
            Self::Unknown(_) => 255,
        }
    }

    /// Collapses a low-level administration-service status onto the taxonomy.
    #[must_use]
    pub fn from_status(status: AdminStatus, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            AdminStatus::AuthGet
            | AdminStatus::AuthAdd
            | AdminStatus::AuthModify
            | AdminStatus::AuthDelete
            | AdminStatus::AuthInsufficient
            | AdminStatus::AuthList
            | AdminStatus::AuthChangePassword
            | AdminStatus::AuthSetKey => Self::AuthError(format!("permission denied: {context}")),
            AdminStatus::BadPassword
            | AdminStatus::GssError
            | AdminStatus::PasswordReuse
            | AdminStatus::PasswordTooSoon
            | AdminStatus::MissingCredentials
            | AdminStatus::KeytabEntryNotFound => Self::AuthError(context),
            AdminStatus::BadMask
            | AdminStatus::BadClass
            | AdminStatus::BadLength
            | AdminStatus::BadPolicy
            | AdminStatus::BadPrincipal
            | AdminStatus::BadAuxAttr
            | AdminStatus::BadMinPassLife => Self::InvalidInput(context),
            AdminStatus::MissingConfParams => Self::ConfigurationError(context),
            AdminStatus::RpcError => Self::ConnectionError(context),
            AdminStatus::UnknownPrincipal => Self::NotFound(context),
            AdminStatus::Duplicate => Self::AlreadyExists(context),
            AdminStatus::Other(code) => Self::Unknown(format!("{context} (status {code})")),
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a request ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_)
                | Self::ConnectionError(_)
                | Self::BadData(_)
                | Self::Unknown(_)
        )
    }
}

/// Renders an error as a stable, human-readable message.
///
/// Details are only available while a connection to the administration service exists;
/// without one the message carries a generic `(no details)` suffix.
#[must_use]
pub fn render_error(err: &Error, connected: bool) -> String {
    let code = err.service_code();
    if connected {
        format!("Admin service error {code}: {err}")
    } else {
        format!("Admin service error {code}: (no details)")
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::ConnectionError(format!("admin service operation timed out: {err}"))
    }
}
