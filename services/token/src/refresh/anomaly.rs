use crate::error::TokenError;
use crate::metrics;
use crate::notify::Notifier;
use rust_common::with_deadline;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What to do when a warning cannot be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// Reject the refresh.
    #[default]
    FailClosed,
    /// Log, count and let the refresh continue.
    FailOpen,
}

impl FromStr for NotifyPolicy {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-closed" => Ok(NotifyPolicy::FailClosed),
            "fail-open" => Ok(NotifyPolicy::FailOpen),
            other => Err(TokenError::Config(format!(
                "unknown anomaly policy `{other}` (expected fail-closed or fail-open)"
            ))),
        }
    }
}

/// Raises a warning when a refresh arrives from a different origin than the
/// one the pair was issued to.
pub struct AnomalyDetector {
    notifier: Arc<dyn Notifier>,
    recipient: String,
    policy: NotifyPolicy,
    timeout: Duration,
}

impl AnomalyDetector {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        recipient: impl Into<String>,
        policy: NotifyPolicy,
        timeout: Duration,
    ) -> Self {
        AnomalyDetector {
            notifier,
            recipient: recipient.into(),
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    /// Returns whether a warning was sent.
    ///
    /// Origins are compared as exact strings. Under [`NotifyPolicy::FailOpen`]
    /// a delivery failure still returns `Ok(false)`.
    pub async fn check(
        &self,
        bound_origin: &str,
        request_origin: &str,
        user_agent: &str,
    ) -> Result<bool, TokenError> {
        if bound_origin == request_origin {
            return Ok(false);
        }

        metrics::record_security_event(metrics::ORIGIN_MISMATCH);
        warn!(
            bound_origin = %bound_origin,
            request_origin = %request_origin,
            "Refresh from unexpected origin"
        );

        let message = warning_message(request_origin, user_agent);
        let delivery = with_deadline(
            self.timeout,
            "notifier.send",
            self.notifier.send(&self.recipient, &message),
        )
        .await
        .map_err(TokenError::from)
        .and_then(|sent| sent.map_err(TokenError::from));

        match (delivery, self.policy) {
            (Ok(()), _) => {
                info!(to = %self.recipient, "Origin warning delivered");
                Ok(true)
            }
            (Err(e), NotifyPolicy::FailClosed) => Err(e),
            (Err(e), NotifyPolicy::FailOpen) => {
                metrics::record_security_event(metrics::NOTIFY_FAILED);
                warn!(error = %e, "Origin warning not delivered, continuing");
                Ok(false)
            }
        }
    }
}

fn warning_message(request_origin: &str, user_agent: &str) -> String {
    format!(
        "WARNING: your session was refreshed from another device\n\
         ip: [{request_origin}]\n\
         user-agent: [{user_agent}]\n\
         If this was you, ignore this message.\n"
    )
}
