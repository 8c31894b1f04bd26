use crate::config::Config;
use crate::error::TokenError;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::refresh::{AnomalyDetector, CredentialIssuer, RotationCoordinator};
use crate::storage::{InMemorySessionStore, RedisStorage, Resolver, SessionStore, StaticResolver};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Settings the handlers read on every request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub secure_cookies: bool,
    pub trust_forwarded_for: bool,
    pub collaborator_timeout: Duration,
    pub request_timeout: Duration,
}

impl From<&Config> for HttpSettings {
    fn from(config: &Config) -> Self {
        HttpSettings {
            secure_cookies: config.secure_cookies,
            trust_forwarded_for: config.trust_forwarded_for,
            collaborator_timeout: config.collaborator_timeout,
            request_timeout: config.request_timeout,
        }
    }
}

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<CredentialIssuer>,
    pub coordinator: Arc<RotationCoordinator>,
    pub resolver: Arc<dyn Resolver>,
    pub settings: Arc<HttpSettings>,
}

impl AppState {
    /// Wire the core from explicit collaborators.
    pub fn new(
        config: &Config,
        store: Arc<dyn SessionStore>,
        resolver: Arc<dyn Resolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, TokenError> {
        let issuer = Arc::new(CredentialIssuer::new(&config.issuer_settings(), store)?);
        let anomaly = AnomalyDetector::new(
            notifier,
            config.anomaly_notify_address.clone(),
            config.anomaly_policy,
            config.collaborator_timeout,
        );
        let coordinator = Arc::new(RotationCoordinator::new(issuer.clone(), anomaly));

        Ok(AppState {
            issuer,
            coordinator,
            resolver,
            settings: Arc::new(HttpSettings::from(config)),
        })
    }

    /// Pick collaborators from configuration.
    ///
    /// Redis backs both the store and the resolver when `REDIS_URL` is set;
    /// otherwise both live in process. The webhook notifier replaces the log
    /// notifier when `NOTIFIER_WEBHOOK_URL` is set.
    pub async fn from_config(config: &Config) -> Result<Self, TokenError> {
        let (store, resolver): (Arc<dyn SessionStore>, Arc<dyn Resolver>) = match &config.redis_url {
            Some(url) => {
                let redis = RedisStorage::new(url).await?;
                for (guid, principal) in &config.principals {
                    redis.register_principal(guid, *principal).await?;
                }
                info!(principals = config.principals.len(), "Using Redis session store");
                let redis = Arc::new(redis);
                let store: Arc<dyn SessionStore> = redis.clone();
                let resolver: Arc<dyn Resolver> = redis;
                (store, resolver)
            }
            None => {
                info!(principals = config.principals.len(), "Using in-memory session store");
                let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
                let resolver: Arc<dyn Resolver> =
                    Arc::new(StaticResolver::new(config.principals.clone()));
                (store, resolver)
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.notifier_webhook_url {
            Some(url) => {
                info!(endpoint = %url, "Using webhook notifier");
                Arc::new(WebhookNotifier::new(url.clone(), config.collaborator_timeout)?)
            }
            None => Arc::new(LogNotifier),
        };

        Self::new(config, store, resolver, notifier)
    }
}
