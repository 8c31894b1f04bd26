//! In-process collaborators for development and tests.

use super::{ResolveError, Resolver, SessionStore, StoreError};
use crate::jwt::PrincipalId;
use crate::refresh::SessionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Session records held in a map; the write lock makes `replace` atomic.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<PrincipalId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(
        &self,
        principal: PrincipalId,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let mut sessions = self.sessions.write();
        let record = match sessions.get(&principal) {
            Some(current) => current.successor(secret_hash, expires_at),
            None => SessionRecord::new(principal, secret_hash, expires_at),
        };
        sessions.insert(principal, record.clone());
        Ok(record)
    }

    async fn get(&self, principal: PrincipalId) -> Result<SessionRecord, StoreError> {
        self.sessions
            .read()
            .get(&principal)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn replace(
        &self,
        principal: PrincipalId,
        expected_version: u64,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let mut sessions = self.sessions.write();
        let current = sessions.get(&principal).ok_or(StoreError::NotFound)?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found: current.version,
            });
        }
        let record = current.successor(secret_hash, expires_at);
        sessions.insert(principal, record.clone());
        Ok(record)
    }
}

/// Fixed GUID → principal table, seeded from configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    principals: HashMap<String, PrincipalId>,
}

impl StaticResolver {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PrincipalId)>,
        S: Into<String>,
    {
        StaticResolver {
            principals: entries
                .into_iter()
                .map(|(guid, id)| (guid.into().to_ascii_lowercase(), id))
                .collect(),
        }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve_principal(&self, guid: &str) -> Result<PrincipalId, ResolveError> {
        self.principals
            .get(guid)
            .copied()
            .ok_or(ResolveError::NotFound)
    }
}
