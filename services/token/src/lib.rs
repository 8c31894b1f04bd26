//! Session token service library.
//!
//! Issues signed access/refresh pairs, rotates refresh tokens exactly once
//! per secret, and warns the principal when a refresh arrives from an
//! unexpected origin.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod jwt;
pub mod metrics;
pub mod notify;
pub mod refresh;
pub mod storage;

// Re-exports for convenience
pub use config::Config;
pub use error::TokenError;
