use super::{ResolveError, Resolver, SessionStore, StoreError};
use crate::jwt::PrincipalId;
use crate::refresh::SessionRecord;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;

/// Bump the version and overwrite the record unconditionally.
/// The key expires with the session.
const PUT_SCRIPT: &str = r"
local version = redis.call('HINCRBY', KEYS[1], 'version', 1)
redis.call('HSET', KEYS[1], 'hash', ARGV[1], 'expires_at', ARGV[2])
redis.call('PEXPIREAT', KEYS[1], ARGV[2])
return version
";

/// Overwrite only while the stored version equals ARGV[1].
/// Returns the new version, -1 when missing, or -2 - found on conflict.
const REPLACE_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'version')
if not current then
  return -1
end
current = tonumber(current)
if current ~= tonumber(ARGV[1]) then
  return -2 - current
end
local version = current + 1
redis.call('HSET', KEYS[1], 'hash', ARGV[2], 'expires_at', ARGV[3], 'version', version)
redis.call('PEXPIREAT', KEYS[1], ARGV[3])
return version
";

/// Session store and resolver backed by Redis.
///
/// Layout: `session:<id>` is a hash of `hash`, `expires_at` (unix ms) and
/// `version`; `principal:<guid>` holds the principal id.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    put_script: Script,
    replace_script: Script,
}

impl RedisStorage {
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(RedisStorage {
            conn,
            put_script: Script::new(PUT_SCRIPT),
            replace_script: Script::new(REPLACE_SCRIPT),
        })
    }

    /// Register a GUID → principal mapping.
    pub async fn register_principal(&self, guid: &str, principal: PrincipalId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(principal_key(guid), principal.0)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))
    }
}

fn session_key(principal: PrincipalId) -> String {
    format!("session:{}", principal)
}

fn principal_key(guid: &str) -> String {
    format!("principal:{}", guid)
}

fn decode_record(
    principal: PrincipalId,
    fields: &HashMap<String, String>,
) -> Result<SessionRecord, StoreError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Internal(format!("session field `{}` missing", name)))
    };

    let expires_ms: i64 = field("expires_at")?
        .parse()
        .map_err(|e| StoreError::Internal(format!("bad expires_at: {}", e)))?;
    let expires_at = Utc
        .timestamp_millis_opt(expires_ms)
        .single()
        .ok_or_else(|| StoreError::Internal("expires_at out of range".to_string()))?;
    let version: u64 = field("version")?
        .parse()
        .map_err(|e| StoreError::Internal(format!("bad version: {}", e)))?;

    Ok(SessionRecord {
        principal_id: principal,
        secret_hash: field("hash")?.clone(),
        expires_at,
        version,
    })
}

#[async_trait]
impl SessionStore for RedisStorage {
    async fn put(
        &self,
        principal: PrincipalId,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let mut conn = self.conn.clone();
        let version: i64 = self
            .put_script
            .key(session_key(principal))
            .arg(&secret_hash)
            .arg(expires_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(SessionRecord {
            principal_id: principal,
            secret_hash,
            expires_at,
            version: version as u64,
        })
    }

    async fn get(&self, principal: PrincipalId) -> Result<SessionRecord, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(session_key(principal))
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if fields.is_empty() {
            return Err(StoreError::NotFound);
        }
        decode_record(principal, &fields)
    }

    async fn replace(
        &self,
        principal: PrincipalId,
        expected_version: u64,
        secret_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let mut conn = self.conn.clone();
        let outcome: i64 = self
            .replace_script
            .key(session_key(principal))
            .arg(expected_version)
            .arg(&secret_hash)
            .arg(expires_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        match outcome {
            -1 => Err(StoreError::NotFound),
            n if n < -1 => Err(StoreError::VersionConflict {
                expected: expected_version,
                found: (-2 - n) as u64,
            }),
            version => Ok(SessionRecord {
                principal_id: principal,
                secret_hash,
                expires_at,
                version: version as u64,
            }),
        }
    }
}

#[async_trait]
impl Resolver for RedisStorage {
    async fn resolve_principal(&self, guid: &str) -> Result<PrincipalId, ResolveError> {
        let mut conn = self.conn.clone();
        let id: Option<i64> = conn
            .get(principal_key(guid))
            .await
            .map_err(|e| ResolveError::Internal(e.to_string()))?;

        id.map(PrincipalId).ok_or(ResolveError::NotFound)
    }
}
