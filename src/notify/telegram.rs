//! Telegram bot notifications

use async_trait::async_trait;
use serde::Serialize;

use super::{Notifier, NotifyError};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts messages through the Bot API `sendMessage` method
pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
    chat_id: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(http: reqwest::Client, token: String, chat_id: String) -> Self {
        Self {
            http,
            token,
            chat_id,
            base_url: API_BASE.to_string(),
        }
    }

    /// From `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty())?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty())?;
        Some(Self::new(http, token, chat_id))
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };
        let response = self.http.post(self.endpoint()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status {
                channel: "telegram",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
