//! Discord webhook notifications

use async_trait::async_trait;
use serde::Serialize;

use super::{Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
    username: &'a str,
}

/// Posts messages to a Discord webhook
pub struct DiscordNotifier {
    http: reqwest::Client,
    webhook_url: String,
    username: String,
}

impl DiscordNotifier {
    pub fn new(http: reqwest::Client, webhook_url: String, username: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url,
            username: username.into(),
        }
    }

    /// From `DISCORD_WEBHOOK_URL`
    pub fn from_env(http: reqwest::Client, username: &str) -> Option<Self> {
        let url = std::env::var("DISCORD_WEBHOOK_URL").ok().filter(|u| !u.is_empty())?;
        Some(Self::new(http, url, username))
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let body = WebhookMessage {
            content: message,
            username: &self.username,
        };
        let response = self.http.post(&self.webhook_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status {
                channel: "discord",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
