use super::{NotifyError, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use rust_common::{build_http_client, HttpConfig, PlatformError};
use serde::Serialize;
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    message: &'a str,
}

/// Posts warnings as JSON to a mail relay endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: Url,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, PlatformError> {
        let config = HttpConfig::default()
            .with_timeout(timeout)
            .with_user_agent(concat!("session-token-service/", env!("CARGO_PKG_VERSION")));
        let client = build_http_client(&config)?;
        Ok(WebhookNotifier { client, endpoint })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&RelayMessage { to: address, message })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(PlatformError::from(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
