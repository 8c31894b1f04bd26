//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! This crate provides centralized implementations for:
//! - A platform error type shared by collaborator clients
//! - HTTP client configuration and building
//! - Bounded deadlines for calls into external collaborators
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod deadline;
pub mod error;
pub mod http;
pub mod tracing_config;

pub use deadline::with_deadline;
pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
