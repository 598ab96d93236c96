//! Telegram Bot API sink.

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::TelegramConfig;

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramClient {
    /// Build a client when both token and chat id are configured
    pub fn from_config(config: &TelegramConfig) -> Option<Arc<Self>> {
        let (token, chat_id) = match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat_id)) => (token.clone(), chat_id.clone()),
            _ => return None,
        };

        info!("Telegram notifications enabled");
        Some(Arc::new(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_url: format!("https://api.telegram.org/bot{}/sendMessage", token),
            chat_id,
        }))
    }

    /// Send a Markdown message, framed with the bot header and timestamp
    pub async fn send_message(&self, text: &str) -> Result<(), String> {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let full_text = format!("\u{1f916} *Flare Trading Bot*\n\u{23f0} {}\n\n{}", timestamp, text);

        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &full_text,
            parse_mode: "Markdown",
        };

        match self.client.post(&self.api_url).json(&payload).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Telegram notification sent");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Telegram notification failed: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                error!("Telegram request failed: {}", e);
                Err(e.to_string())
            }
        }
    }
}
