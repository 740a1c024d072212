//! Stream event notifications
//!
//! Fire-and-forget webhooks for show milestones (news segment started and
//! the like). Delivery failures are logged and swallowed; the show never
//! waits on a webhook.

use serde_json::json;
use std::time::Duration;

use crate::config::EventsConfig;

/// Posts stream events to the configured webhook URLs
#[derive(Debug, Clone)]
pub struct EventClient {
    client: reqwest::Client,
    urls: Vec<String>,
    timeout: Duration,
}

impl EventClient {
    /// Returns `None` when no webhook URLs are configured
    pub fn from_config(config: &EventsConfig) -> Option<Self> {
        if config.webhook_urls.is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            urls: config.webhook_urls.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Send an event to every configured webhook
    pub async fn send(&self, event_type: &str, data: serde_json::Value) {
        let payload = json!({
            "event": event_type,
            "data": data,
        });

        for url in &self.urls {
            let result = self
                .client
                .post(url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Event '{}' sent to {}", event_type, url);
                }
                Ok(response) => {
                    tracing::warn!(
                        "Event '{}' rejected by {}: HTTP {}",
                        event_type,
                        url,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to send event '{}' to {}: {}", event_type, url, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventsConfig;

    #[test]
    fn test_no_client_without_urls() {
        let config = EventsConfig::default();
        assert!(EventClient::from_config(&config).is_none());
    }

    #[test]
    fn test_client_with_urls() {
        let config = EventsConfig {
            webhook_urls: vec!["http://127.0.0.1:8002/events".to_string()],
            timeout_secs: 2,
        };
        assert!(EventClient::from_config(&config).is_some());
    }
}
