//! Telegram notification client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::io::HttpClient;
use crate::notifier::{Notification, Notifier};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Per-attempt delivery timeout; retries are the dispatcher's concern
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Telegram notification sender
pub struct TelegramNotifier {
    bot_token: Option<String>,
    chat_id: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("configured", &self.enabled())
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(
        bot_token: Option<String>,
        chat_id: Option<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let configured = bot_token.is_some() && chat_id.is_some();
        tracing::debug!("Created TelegramNotifier (configured: {})", configured);

        Self {
            bot_token,
            chat_id,
            http,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn type_name(&self) -> &str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let (token, chat_id) = match (&self.bot_token, &self.chat_id) {
            (Some(token), Some(chat_id)) => (token, chat_id),
            _ => {
                return Err(crate::VigilError::Notifier(
                    "Telegram credentials not configured".to_string(),
                ))
            }
        };

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, token);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": notification.text,
            "parse_mode": "HTML",
        });

        let response = self.http.post_json(&url, &body, ATTEMPT_TIMEOUT).await?;

        if response.status != 200 {
            return Err(crate::VigilError::Notifier(format!(
                "Telegram API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Telegram notification sent successfully");
        Ok(())
    }
}
