//! Pushover Notification Adapter
//!
//! Implements the `Notifier` port by posting messages to the Pushover
//! messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::ports::Notifier;
use crate::error::{Error, Result};

/// Pushover messages endpoint
pub const PUSHOVER_MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Pushover notifier
#[derive(Debug, Clone)]
pub struct PushoverConfig {
    /// Application token
    pub app_key: String,

    /// User or group key
    pub user_key: String,

    /// Messages endpoint
    pub endpoint: String,

    /// Request timeout
    pub timeout: Duration,
}

impl PushoverConfig {
    pub fn new(app_key: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            user_key: user_key.into(),
            endpoint: PUSHOVER_MESSAGES_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    token: &'a str,
    user: &'a str,
    message: &'a str,
}

// =============================================================================
// Notifier
// =============================================================================

/// Sends notifications through Pushover
pub struct PushoverNotifier {
    config: PushoverConfig,
    client: Client,
}

impl PushoverNotifier {
    /// Create a new Pushover notifier
    pub fn new(config: PushoverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::NotificationFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

impl std::fmt::Debug for PushoverNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverNotifier")
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    #[instrument(skip_all)]
    async fn notify(&self, message: &str) -> Result<()> {
        info!("Sending pushover notification, message: {}", message);

        let body = MessageRequest {
            token: &self.config.app_key,
            user: &self.config.user_key,
            message,
        };
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::NotificationFailed(format!(
                "Pushover returned {}: {}",
                status, text
            )));
        }

        debug!(%status, "Pushover response");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_config_defaults() {
        let config = PushoverConfig::new("app", "user");
        assert_eq!(config.endpoint, PUSHOVER_MESSAGES_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_request_body() {
        let body = MessageRequest {
            token: "app",
            user: "user",
            message: "Starting cacheflush...",
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["token"], "app");
        assert_eq!(json["user"], "user");
        assert_eq!(json["message"], "Starting cacheflush...");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let mut config = PushoverConfig::new("app", "user");
        config.endpoint = "http://127.0.0.1:1/1/messages.json".to_string();
        config.timeout = Duration::from_secs(2);

        let notifier = PushoverNotifier::new(config).unwrap();
        let err = notifier.notify("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotificationFailed);
    }
}
