//! Centralized error types for all Rust libraries.
//!
//! Collaborator clients (HTTP relays, stores, deadline wrappers) report
//! failures through this type so services can map them onto their own
//! taxonomy in one place.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote side answered with a non-success status
    #[error("Upstream {service} answered with status {status}")]
    UpstreamStatus {
        /// The remote service name
        service: String,
        /// HTTP status code returned
        status: u16,
    },

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation did not finish before its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is a deadline expiry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Create an upstream status error for the given service.
    #[must_use]
    pub fn upstream_status(service: impl Into<String>, status: u16) -> Self {
        Self::UpstreamStatus {
            service: service.into(),
            status,
        }
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error with the given message.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
