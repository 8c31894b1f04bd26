//! Error taxonomy for issuance and rotation.
//!
//! Every variant belongs to one [`ErrorKind`], and only the kind reaches the
//! client. The variant itself is logged so operators can see which check
//! failed without the response telling an attacker.

use crate::jwt::VerifyError;
use crate::notify::NotifyError;
use crate::refresh::HashError;
use crate::storage::{ResolveError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_common::PlatformError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TokenError {
    // Validation (400)
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Request must have query param `guid`")]
    MissingGuid,

    #[error("Query param `guid` is not a valid GUID")]
    InvalidGuid,

    #[error("Unknown value of query param `guid`")]
    UnknownPrincipal,

    // Auth (401)
    #[error("Token verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Access and refresh tokens were not issued together")]
    TokenMismatch,

    #[error("No live session for principal")]
    SessionMissing,

    #[error("Token refresh reused - secret does not match the current session")]
    RefreshReused,

    #[error("Token refresh expired")]
    RefreshExpired,

    #[error("Session rotated concurrently")]
    ConcurrentRotation,

    // Internal (500)
    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Principal resolver error: {0}")]
    Resolver(String),

    #[error("Secret hashing error: {0}")]
    Hashing(String),

    #[error("JWT signing error: {0}")]
    Signing(String),

    #[error("Anomaly notification failed: {0}")]
    Notification(String),

    #[error("Collaborator timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error class; decides the status code and public message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric/label form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "invalid_request",
            Self::Auth => "unauthorized",
            Self::Internal => "internal_error",
        }
    }
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential(_)
            | Self::MissingGuid
            | Self::InvalidGuid
            | Self::UnknownPrincipal => ErrorKind::Validation,
            Self::Verify(_)
            | Self::TokenMismatch
            | Self::SessionMissing
            | Self::RefreshReused
            | Self::RefreshExpired
            | Self::ConcurrentRotation => ErrorKind::Auth,
            Self::Storage(_)
            | Self::Resolver(_)
            | Self::Hashing(_)
            | Self::Signing(_)
            | Self::Notification(_)
            | Self::Timeout(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// Message safe to return to the caller.
    ///
    /// Validation errors name the offending input; everything else collapses
    /// to a fixed string.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => match self {
                Self::MissingCredential(_) => "missing credentials".to_string(),
                other => other.to_string(),
            },
            ErrorKind::Auth => "unauthorized".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
        }
    }
}

impl From<PlatformError> for TokenError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Timeout(msg) => TokenError::Timeout(msg),
            other => TokenError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TokenError::SessionMissing,
            StoreError::VersionConflict { .. } => TokenError::ConcurrentRotation,
            StoreError::Internal(msg) => TokenError::Storage(msg),
        }
    }
}

impl From<ResolveError> for TokenError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => TokenError::UnknownPrincipal,
            ResolveError::Internal(msg) => TokenError::Resolver(msg),
        }
    }
}

impl From<HashError> for TokenError {
    fn from(err: HashError) -> Self {
        TokenError::Hashing(err.to_string())
    }
}

impl From<NotifyError> for TokenError {
    fn from(err: NotifyError) -> Self {
        TokenError::Notification(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Validation => tracing::debug!(error = %self, "Rejected request"),
            ErrorKind::Auth => tracing::warn!(error = %self, "Authentication failed"),
            ErrorKind::Internal => tracing::error!(error = %self, "Internal failure"),
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
