use crate::error::TokenError;
use crate::jwt::{AccessClaims, JwtSerializer, PrincipalId, RefreshClaims, SigningKey, TokenUse};
use crate::metrics;
use crate::refresh::generator::{HashConfig, RefreshTokenGenerator, SecretHasher};
use crate::refresh::session::SessionRecord;
use crate::storage::SessionStore;
use chrono::{DateTime, Months, Utc};
use rust_common::with_deadline;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

/// Everything needed to mint credential pairs.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub issuer: String,
    pub access_key: SigningKey,
    pub refresh_key: SigningKey,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl_months: u32,
    pub collaborator_timeout: Duration,
    pub hash: HashConfig,
}

/// A freshly minted access/refresh pair and the session record backing it.
pub struct IssuedCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub session: SessionRecord,
}

impl fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Signed pair plus the hash to persist, before anything is written.
struct Minted {
    access_token: String,
    refresh_token: String,
    secret_hash: String,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
}

/// Mints credential pairs and writes the session record that makes the
/// refresh half usable.
///
/// Signing and hashing both happen before the store is touched, so a failure
/// anywhere leaves the previous session untouched.
pub struct CredentialIssuer {
    access: JwtSerializer,
    refresh: JwtSerializer,
    hasher: SecretHasher,
    store: Arc<dyn SessionStore>,
    access_ttl: chrono::Duration,
    refresh_ttl: Months,
    timeout: Duration,
}

impl CredentialIssuer {
    pub fn new(settings: &IssuerSettings, store: Arc<dyn SessionStore>) -> Result<Self, TokenError> {
        if settings.access_key == settings.refresh_key {
            return Err(TokenError::Config(
                "access and refresh signing keys must differ".to_string(),
            ));
        }
        if settings.refresh_ttl_months == 0 {
            return Err(TokenError::Config("refresh lifetime must be at least one month".to_string()));
        }
        if settings.access_ttl <= chrono::Duration::zero() {
            return Err(TokenError::Config("access lifetime must be positive".to_string()));
        }

        Ok(CredentialIssuer {
            access: JwtSerializer::new(settings.issuer.clone(), &settings.access_key),
            refresh: JwtSerializer::new(settings.issuer.clone(), &settings.refresh_key),
            hasher: SecretHasher::new(settings.hash)?,
            store,
            access_ttl: settings.access_ttl,
            refresh_ttl: Months::new(settings.refresh_ttl_months),
            timeout: settings.collaborator_timeout,
        })
    }

    pub fn access_serializer(&self) -> &JwtSerializer {
        &self.access
    }

    pub fn refresh_serializer(&self) -> &JwtSerializer {
        &self.refresh
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn collaborator_timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new session for `principal`, discarding any existing one.
    pub async fn issue(
        &self,
        principal: PrincipalId,
        origin: &str,
    ) -> Result<IssuedCredentials, TokenError> {
        let minted = self.mint(principal, origin).await?;

        let session = with_deadline(
            self.timeout,
            "session.put",
            self.store
                .put(principal, minted.secret_hash.clone(), minted.refresh_expires_at),
        )
        .await??;

        Ok(self.finish(principal, minted, session))
    }

    /// Rotate the session, but only if it is still at `expected_version`.
    ///
    /// A concurrent rotation that got there first turns this call into
    /// [`TokenError::ConcurrentRotation`].
    pub async fn reissue(
        &self,
        principal: PrincipalId,
        origin: &str,
        expected_version: u64,
    ) -> Result<IssuedCredentials, TokenError> {
        let minted = self.mint(principal, origin).await?;

        let session = with_deadline(
            self.timeout,
            "session.replace",
            self.store.replace(
                principal,
                expected_version,
                minted.secret_hash.clone(),
                minted.refresh_expires_at,
            ),
        )
        .await??;

        Ok(self.finish(principal, minted, session))
    }

    /// Check a presented refresh secret against a stored hash.
    pub async fn verify_secret(&self, secret: &str, stored_hash: &str) -> Result<bool, TokenError> {
        let hasher = self.hasher.clone();
        let secret = Zeroizing::new(secret.to_string());
        let stored = stored_hash.to_string();

        let task = tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored));
        let verified = with_deadline(self.timeout, "secret.verify", task)
            .await?
            .map_err(|e| TokenError::Internal(format!("verify task failed: {e}")))??;
        Ok(verified)
    }

    async fn hash_secret(&self, secret: Zeroizing<String>) -> Result<String, TokenError> {
        let hasher = self.hasher.clone();

        let task = tokio::task::spawn_blocking(move || hasher.hash(&secret));
        let hash = with_deadline(self.timeout, "secret.hash", task)
            .await?
            .map_err(|e| TokenError::Internal(format!("hash task failed: {e}")))??;
        Ok(hash)
    }

    async fn mint(&self, principal: PrincipalId, origin: &str) -> Result<Minted, TokenError> {
        let now = Utc::now();
        let access_expires_at = now
            .checked_add_signed(self.access_ttl)
            .ok_or_else(|| TokenError::Internal("access expiry out of range".to_string()))?;
        let refresh_expires_at = now
            .checked_add_months(self.refresh_ttl)
            .ok_or_else(|| TokenError::Internal("refresh expiry out of range".to_string()))?;

        let secret = RefreshTokenGenerator::generate();
        let iid = RefreshTokenGenerator::generate_issuance_id();

        let access_claims = AccessClaims {
            iss: self.access.issuer().to_string(),
            token_use: TokenUse::Access,
            user_id: principal,
            origin: origin.to_string(),
            iid: iid.clone(),
            exp: access_expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let refresh_claims = RefreshClaims {
            iss: self.refresh.issuer().to_string(),
            token_use: TokenUse::Refresh,
            user_id: principal,
            rid: secret.to_string(),
            origin: origin.to_string(),
            iid,
            exp: refresh_expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = self.access.serialize(&access_claims)?;
        let refresh_token = self.refresh.serialize(&refresh_claims)?;
        let secret_hash = self.hash_secret(secret).await?;

        Ok(Minted {
            access_token,
            refresh_token,
            secret_hash,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn finish(&self, principal: PrincipalId, minted: Minted, session: SessionRecord) -> IssuedCredentials {
        metrics::record_token_issued(TokenUse::Access.as_str());
        metrics::record_token_issued(TokenUse::Refresh.as_str());

        info!(
            user_id = %principal,
            version = session.version,
            refresh_expires_at = %minted.refresh_expires_at,
            "Issued credential pair"
        );

        IssuedCredentials {
            access_token: minted.access_token,
            refresh_token: minted.refresh_token,
            access_expires_at: minted.access_expires_at,
            refresh_expires_at: minted.refresh_expires_at,
            session,
        }
    }
}
