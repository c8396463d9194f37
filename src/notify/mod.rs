//! Operator notifications
//!
//! Fire-and-forget delivery to Telegram, Discord and the log. A failing
//! channel is logged and never interrupts trading.

mod discord;
mod telegram;

pub use discord::DiscordNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotifyConfig;

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{channel} returned status {status}")]
    Status { channel: &'static str, status: u16 },
}

/// A notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(message, "Notification");
        Ok(())
    }
}

/// Fans a message out to every configured channel
pub struct MultiNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Log channel plus every enabled channel whose credentials are in the
    /// environment
    pub fn from_config(config: &NotifyConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
        if config.telegram {
            match TelegramNotifier::from_env(http.clone()) {
                Some(telegram) => channels.push(Box::new(telegram)),
                None => tracing::debug!("Telegram credentials not set, channel disabled"),
            }
        }
        if config.discord {
            match DiscordNotifier::from_env(http, &config.discord_username) {
                Some(discord) => channels.push(Box::new(discord)),
                None => tracing::debug!("Discord webhook not set, channel disabled"),
            }
        }
        Self::new(channels)
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver to all channels. Failures are logged and swallowed.
    pub async fn notify(&self, message: &str) {
        for channel in &self.channels {
            if let Err(e) = channel.send(message).await {
                tracing::warn!(channel = channel.name(), error = %e, "Notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Status {
                channel: "failing",
                status: 500,
            })
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_fan_out() {
        let seen = Arc::new(Mutex::new(vec![]));
        let notifier = MultiNotifier::new(vec![
            Box::new(Failing),
            Box::new(Recording(seen.clone())),
        ]);

        notifier.notify("position opened").await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["position opened"]);
    }

    #[test]
    fn test_disabled_channels_leave_log_only() {
        let config = NotifyConfig {
            telegram: false,
            discord: false,
            ..NotifyConfig::default()
        };
        let notifier = MultiNotifier::from_config(&config);
        assert_eq!(notifier.channel_names(), vec!["log"]);
    }
}
