use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

/// Best-effort outbound messaging. `send` returns whether the transport
/// accepted the message; callers never treat a failure as an operation
/// failure, they log it and move on (the reminder scan retries naturally).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_phone: &str, body: &str) -> bool;
}

/// Client for the local WhatsApp bridge process, which exposes
/// `POST {base}/send` with a `{"to", "body"}` payload. An unset base URL
/// disables messaging entirely.
pub struct WhatsAppBridge {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl WhatsAppBridge {
    pub fn new(base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

#[async_trait]
impl Notifier for WhatsAppBridge {
    async fn send(&self, to_phone: &str, body: &str) -> bool {
        let Some(base_url) = self.base_url.as_deref() else {
            log::warn!("WhatsApp bridge URL not configured. Skipping notification.");
            return false;
        };

        let clean_phone: String = to_phone.chars().filter(char::is_ascii_digit).collect();
        let url = format!("{base_url}/send");
        let payload = json!({ "to": clean_phone, "body": body });

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("WhatsApp message sent to {clean_phone} via bridge");
                true
            }
            Ok(response) => {
                log::error!("WhatsApp bridge returned {}", response.status());
                false
            }
            Err(err) => {
                log::error!("Failed to send WhatsApp message via bridge: {err}");
                false
            }
        }
    }
}

/// One-shot admin ping through the Telegram bot API. Used for new booking
/// requests only; missing credentials make this a no-op.
pub async fn send_telegram(token: Option<&str>, chat_id: Option<&str>, message: &str) -> bool {
    let (Some(token), Some(chat_id)) = (token, chat_id) else {
        log::warn!("Telegram credentials not configured. Skipping admin notification.");
        return false;
    };

    let url = format!("https://api.telegram.org/bot{token}/sendMessage");
    let payload = json!({ "chat_id": chat_id, "text": message, "parse_mode": "HTML" });

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            log::error!("Failed to build Telegram client: {err}");
            return false;
        }
    };

    match client.post(&url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            log::error!("Telegram API returned {}", response.status());
            false
        }
        Err(err) => {
            log::error!("Failed to send Telegram message: {err}");
            false
        }
    }
}
