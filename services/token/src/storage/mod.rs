//! Persistence collaborators: principal lookup and session records.
//!
//! The service only talks to these traits. [`memory`] backs development and
//! tests; [`redis`] is the production store.

pub mod memory;
pub mod redis;

use crate::jwt::PrincipalId;
use crate::refresh::SessionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use self::redis::RedisStorage;
pub use memory::{InMemorySessionStore, StaticResolver};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,

    #[error("session version changed (expected {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },

    #[error("store failure: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("principal not found")]
    NotFound,

    #[error("resolver failure: {0}")]
    Internal(String),
}

/// Maps an external GUID to the internal principal id.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// `guid` arrives normalised (lowercase, hyphenated).
    async fn resolve_principal(&self, guid: &str) -> Result<PrincipalId, ResolveError>;
}

/// One session record per principal.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Unconditionally replace the principal's record.
    async fn put(
        &self,
        principal: PrincipalId,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError>;

    async fn get(&self, principal: PrincipalId) -> Result<SessionRecord, StoreError>;

    /// Replace the record only if its version is still `expected_version`.
    ///
    /// The compare and the write happen atomically.
    async fn replace(
        &self,
        principal: PrincipalId,
        expected_version: u64,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError>;
}
