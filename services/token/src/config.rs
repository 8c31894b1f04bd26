//! Centralized configuration for the session token service.
//!
//! All configuration is loaded from environment variables (after an
//! optional env file, `config/app.env` unless `CONFIG_FILE` names another)
//! and validated once at startup. Nothing changes after load.

use crate::error::TokenError;
use crate::jwt::{PrincipalId, SigningKey};
use crate::refresh::{HashConfig, IssuerSettings, NotifyPolicy};
use std::env;
use std::time::Duration;
use url::Url;

/// Env file read before the process environment when `CONFIG_FILE` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "config/app.env";

/// Sequential collaborator calls on the slowest path, `/api/refresh`:
/// session load, secret verify, notify, secret hash and session replace.
pub const COLLABORATOR_CALLS_PER_REFRESH: u32 = 5;

/// Session token service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Whole-request deadline
    pub request_timeout: Duration,

    // Token settings
    /// Issuer tag written into and required from every token
    pub jwt_issuer: String,
    pub access_key: SigningKey,
    pub refresh_key: SigningKey,
    /// Access token lifetime
    pub access_ttl: chrono::Duration,
    /// Refresh token lifetime in calendar months
    pub refresh_ttl_months: u32,
    /// Argon2id cost for refresh secrets at rest
    pub hash: HashConfig,

    // Collaborators
    /// Per-call deadline for store, resolver, hashing and notifier
    pub collaborator_timeout: Duration,
    pub redis_url: Option<String>,
    /// GUID → principal seed for the in-process resolver
    pub principals: Vec<(String, PrincipalId)>,
    pub notifier_webhook_url: Option<Url>,
    pub anomaly_notify_address: String,
    pub anomaly_policy: NotifyPolicy,

    // HTTP surface
    pub secure_cookies: bool,
    /// Take the request origin from `X-Forwarded-For`
    pub trust_forwarded_for: bool,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, TokenError> {
        let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        load_env_file(&path)?;
        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_env(&lookup, "HTTP_PORT", 8080u16)?;
        let request_timeout = Duration::from_secs(parse_env(&lookup, "REQUEST_TIMEOUT_SECS", 20u64)?);

        let jwt_issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "authApp".to_string());
        let access_key = required_key(&lookup, "ACCESS_KEY")?;
        let refresh_key = required_key(&lookup, "REFRESH_KEY")?;
        if access_key == refresh_key {
            return Err(TokenError::Config(
                "ACCESS_KEY and REFRESH_KEY must differ".to_string(),
            ));
        }

        let access_minutes: i64 = parse_env(&lookup, "ACCESS_EXP_MINUTES", 30)?;
        let access_ttl = chrono::Duration::try_minutes(access_minutes)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| TokenError::Config("ACCESS_EXP_MINUTES must be positive".to_string()))?;
        let refresh_ttl_months: u32 = parse_env(&lookup, "REFRESH_EXP_MONTHS", 2)?;
        if refresh_ttl_months == 0 {
            return Err(TokenError::Config("REFRESH_EXP_MONTHS must be positive".to_string()));
        }

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_env(&lookup, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_env(&lookup, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_env(&lookup, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        let collaborator_timeout =
            Duration::from_millis(parse_env(&lookup, "COLLABORATOR_TIMEOUT_MS", 3000u64)?);
        if collaborator_timeout.is_zero() {
            return Err(TokenError::Config("COLLABORATOR_TIMEOUT_MS must be positive".to_string()));
        }
        let worst_case = collaborator_timeout * COLLABORATOR_CALLS_PER_REFRESH;
        if request_timeout < worst_case {
            return Err(TokenError::Config(format!(
                "REQUEST_TIMEOUT_SECS must cover {COLLABORATOR_CALLS_PER_REFRESH} collaborator calls ({}ms)",
                worst_case.as_millis()
            )));
        }
        let redis_url = lookup("REDIS_URL").filter(|v| !v.trim().is_empty());
        let principals = parse_principals(lookup("PRINCIPALS").as_deref().unwrap_or(""))?;
        let notifier_webhook_url = lookup("NOTIFIER_WEBHOOK_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                Url::parse(&v)
                    .map_err(|e| TokenError::Config(format!("Invalid NOTIFIER_WEBHOOK_URL: {e}")))
            })
            .transpose()?;
        let anomaly_notify_address =
            lookup("ANOMALY_NOTIFY_ADDRESS").unwrap_or_else(|| "security@localhost".to_string());
        let anomaly_policy = match lookup("ANOMALY_POLICY") {
            Some(v) => v.parse()?,
            None => NotifyPolicy::default(),
        };

        let secure_cookies = parse_env(&lookup, "SECURE_COOKIES", true)?;
        let trust_forwarded_for = parse_env(&lookup, "TRUST_FORWARDED_FOR", false)?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = parse_env(&lookup, "LOG_JSON", false)?;

        Ok(Self {
            host,
            port,
            request_timeout,
            jwt_issuer,
            access_key,
            refresh_key,
            access_ttl,
            refresh_ttl_months,
            hash,
            collaborator_timeout,
            redis_url,
            principals,
            notifier_webhook_url,
            anomaly_notify_address,
            anomaly_policy,
            secure_cookies,
            trust_forwarded_for,
            log_level,
            log_json,
        })
    }

    pub fn issuer_settings(&self) -> IssuerSettings {
        IssuerSettings {
            issuer: self.jwt_issuer.clone(),
            access_key: self.access_key.clone(),
            refresh_key: self.refresh_key.clone(),
            access_ttl: self.access_ttl,
            refresh_ttl_months: self.refresh_ttl_months,
            collaborator_timeout: self.collaborator_timeout,
            hash: self.hash,
        }
    }
}

/// Export an env file into the process environment. A missing file is fine;
/// variables already set are not overridden.
fn load_env_file(path: &str) -> Result<(), TokenError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(TokenError::Config(format!("Invalid config file {path}: {e}"))),
    }
}

/// Parse a variable, falling back to `default` when unset.
fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> Result<T, TokenError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| TokenError::Config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

fn required_key<F>(lookup: &F, name: &str) -> Result<SigningKey, TokenError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).ok_or_else(|| TokenError::Config(format!("{name} is required")))?;
    SigningKey::new(raw.into_bytes()).map_err(|e| TokenError::Config(format!("{name}: {e}")))
}

/// `guid=id,guid=id`; GUIDs are normalised to lowercase hyphenated form.
fn parse_principals(raw: &str) -> Result<Vec<(String, PrincipalId)>, TokenError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (guid, id) = entry
                .split_once('=')
                .ok_or_else(|| TokenError::Config(format!("Invalid PRINCIPALS entry `{entry}`")))?;
            let guid = uuid::Uuid::parse_str(guid.trim())
                .map_err(|e| TokenError::Config(format!("Invalid PRINCIPALS guid `{guid}`: {e}")))?;
            let id = id
                .trim()
                .parse::<i64>()
                .map_err(|e| TokenError::Config(format!("Invalid PRINCIPALS id `{id}`: {e}")))?;
            Ok((guid.hyphenated().to_string(), PrincipalId(id)))
        })
        .collect()
}
