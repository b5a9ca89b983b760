use super::{Notifier, TradeEvent};
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends trade events to a Telegram chat through the Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: i64) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API_BASE, token, chat_id)
    }

    pub fn with_api_base(api_base: &str, token: String, chat_id: i64) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            chat_id,
        })
    }

    /// Deliver one message and wait for the result
    pub async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);

        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Telegram returned {}: {}", status, body).into());
        }

        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, event: &TradeEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, dropping notification: {}", event);
            return;
        };

        let notifier = self.clone();
        let text = event.to_string();
        handle.spawn(async move {
            if let Err(e) = notifier.send(&text).await {
                tracing::warn!("Failed to deliver Telegram notification: {}", e);
            }
        });
    }
}
