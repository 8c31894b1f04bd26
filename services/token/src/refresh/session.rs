use crate::jwt::PrincipalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-held state for the one live refresh secret of a principal.
///
/// `version` increases on every write so a rotation can prove that the
/// record it validated is still the current one when it overwrites it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub principal_id: PrincipalId,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
    pub version: u64,
}

impl SessionRecord {
    pub fn new(principal_id: PrincipalId, secret_hash: String, expires_at: DateTime<Utc>) -> Self {
        SessionRecord {
            principal_id,
            secret_hash,
            expires_at,
            version: 1,
        }
    }

    /// The record that replaces this one.
    pub fn successor(&self, secret_hash: String, expires_at: DateTime<Utc>) -> Self {
        SessionRecord {
            principal_id: self.principal_id,
            secret_hash,
            expires_at,
            version: self.version + 1,
        }
    }

    /// Live strictly before the stored expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("principal_id", &self.principal_id)
            .field("expires_at", &self.expires_at)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
