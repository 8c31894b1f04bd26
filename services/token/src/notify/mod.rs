//! Out-of-band delivery of security warnings.

pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use webhook::WebhookNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("relay rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes the warning to the service log instead of delivering it.
///
/// Used when no relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotifyError> {
        warn!(to = %address, message = %message, "Security notification (log only)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_delivers() {
        assert!(LogNotifier.send("security@localhost", "hello").await.is_ok());
    }
}
