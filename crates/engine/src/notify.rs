//! Notification sinks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use auto_trade_core::{NotificationConfig, NotifyLevel, Notifier};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> Result<()> {
        match level {
            NotifyLevel::Info | NotifyLevel::Success => info!(level = %level, "{message}"),
            NotifyLevel::Warning => warn!(level = %level, "{message}"),
            NotifyLevel::Error => error!(level = %level, "{message}"),
        }
        Ok(())
    }
}

/// One notification as delivered to a front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub level: NotifyLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Forwards notifications over a channel to whatever front-end consumes them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<StatusMessage>,
}

impl ChannelNotifier {
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StatusMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> Result<()> {
        self.tx
            .send(StatusMessage {
                level,
                message: message.to_string(),
                at: Utc::now(),
            })
            .await
            .context("notification receiver dropped")
    }
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    http_client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub const DEFAULT_API_URL: &'static str = "https://api.telegram.org";

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: &str, token: &str, chat_id: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self {
            http_client,
            endpoint: format!("{}/bot{token}/sendMessage", api_url.trim_end_matches('/')),
            chat_id: chat_id.into(),
        })
    }

    /// `Ok(None)` unless both the bot token and chat id are configured.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Self::new(Self::DEFAULT_API_URL, token, chat.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": format!("[{level}] {message}"),
            }))
            .send()
            .await
            .context("sending Telegram message")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram returned {status}: {body}");
        }
        Ok(())
    }
}

/// Delivers to every sink; fails if any sink fails, after trying all of them.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn Notifier>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send_status(&self, message: &str, level: NotifyLevel) -> Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.send_status(message, level).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} sink(s) failed: {}", failures.len(), failures.join("; "))
        }
    }
}
