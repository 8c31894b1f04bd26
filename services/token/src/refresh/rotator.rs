use crate::error::TokenError;
use crate::jwt::{AccessClaims, RefreshClaims};
use crate::metrics;
use crate::refresh::anomaly::AnomalyDetector;
use crate::refresh::issuer::{CredentialIssuer, IssuedCredentials};
use chrono::Utc;
use rust_common::with_deadline;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Checkpoints of a refresh, in order.
///
/// The last stage reached is logged when a refresh is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RotationStage {
    Received,
    AccessChecked,
    RefreshChecked,
    LinkChecked,
    SessionLoaded,
    SecretMatched,
    ExpiryChecked,
    OriginChecked,
    Rotated,
    Responded,
}

impl fmt::Display for RotationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Credentials and request context presented to `/api/refresh`.
#[derive(Clone, Copy)]
pub struct RefreshRequest<'a> {
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub origin: &'a str,
    pub user_agent: &'a str,
}

impl fmt::Debug for RefreshRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("access_token", &self.access_token.map(|_| "[redacted]"))
            .field("refresh_token", &self.refresh_token.map(|_| "[redacted]"))
            .field("origin", &self.origin)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Drives a refresh from presented pair to rotated pair.
pub struct RotationCoordinator {
    issuer: Arc<CredentialIssuer>,
    anomaly: AnomalyDetector,
}

impl RotationCoordinator {
    pub fn new(issuer: Arc<CredentialIssuer>, anomaly: AnomalyDetector) -> Self {
        RotationCoordinator { issuer, anomaly }
    }

    /// Validate the presented pair and rotate it.
    ///
    /// Each refresh secret is accepted at most once: the stored hash is
    /// replaced by the new one in a version-checked write.
    pub async fn rotate(&self, request: RefreshRequest<'_>) -> Result<IssuedCredentials, TokenError> {
        let mut stage = RotationStage::Received;
        match self.run(&request, &mut stage).await {
            Ok(issued) => {
                stage = RotationStage::Responded;
                metrics::record_token_refreshed("ok");
                info!(user_id = %issued.session.principal_id, stage = %stage, "Rotated credential pair");
                Ok(issued)
            }
            Err(e) => {
                metrics::record_token_refreshed(e.kind().as_str());
                warn!(stage = %stage, error = %e, origin = %request.origin, "Refresh rejected");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &RefreshRequest<'_>,
        stage: &mut RotationStage,
    ) -> Result<IssuedCredentials, TokenError> {
        let access_token = request
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingCredential("access_token"))?;
        let refresh_token = request
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingCredential("refresh_token"))?;

        let access: AccessClaims = self.issuer.access_serializer().deserialize(access_token)?;
        *stage = RotationStage::AccessChecked;

        let refresh: RefreshClaims = self.issuer.refresh_serializer().deserialize(refresh_token)?;
        *stage = RotationStage::RefreshChecked;

        let same_issuance: bool = access.iid.as_bytes().ct_eq(refresh.iid.as_bytes()).into();
        if access.user_id != refresh.user_id || !same_issuance {
            return Err(TokenError::TokenMismatch);
        }
        *stage = RotationStage::LinkChecked;

        let principal = refresh.user_id;
        let session = with_deadline(
            self.issuer.collaborator_timeout(),
            "session.get",
            self.issuer.store().get(principal),
        )
        .await??;
        *stage = RotationStage::SessionLoaded;

        if !self.issuer.verify_secret(&refresh.rid, &session.secret_hash).await? {
            metrics::record_security_event(metrics::REFRESH_REUSE);
            return Err(TokenError::RefreshReused);
        }
        *stage = RotationStage::SecretMatched;

        if !session.is_live_at(Utc::now()) {
            return Err(TokenError::RefreshExpired);
        }
        *stage = RotationStage::ExpiryChecked;

        let notified = self
            .anomaly
            .check(&refresh.origin, request.origin, request.user_agent)
            .await?;
        *stage = RotationStage::OriginChecked;
        debug!(user_id = %principal, notified, "Origin checked");

        let issued = self
            .issuer
            .reissue(principal, request.origin, session.version)
            .await?;
        *stage = RotationStage::Rotated;
        Ok(issued)
    }
}
