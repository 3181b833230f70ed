//! WhatsApp Cloud API adapter. Implements MessengerPort.

use crate::domain::DomainError;
use crate::ports::MessengerPort;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

const GRAPH_URL: &str = "https://graph.facebook.com/v18.0";

/// Sends text replies through `POST {graph_url}/{phone_number_id}/messages`.
///
/// Each tenant replies from its own business number; `default_phone_id` covers
/// tenants registered without one.
pub struct WhatsAppClient {
    client: reqwest::Client,
    graph_url: String,
    token: String,
    default_phone_id: Option<String>,
}

impl WhatsAppClient {
    pub fn new(
        token: String,
        default_phone_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            graph_url: GRAPH_URL.to_string(),
            token,
            default_phone_id,
        })
    }

    pub fn with_graph_url(mut self, url: String) -> Self {
        self.graph_url = url.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self, phone_id: &str) -> String {
        format!("{}/{}/messages", self.graph_url, phone_id)
    }
}

pub(crate) fn text_payload(to: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": body },
    })
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[async_trait::async_trait]
impl MessengerPort for WhatsAppClient {
    async fn send_text(
        &self,
        from_phone_id: Option<&str>,
        to: &str,
        body: &str,
    ) -> Result<Option<String>, DomainError> {
        let phone_id = from_phone_id
            .or(self.default_phone_id.as_deref())
            .ok_or_else(|| DomainError::Messenger("no WhatsApp phone number id".to_string()))?;

        let response = self
            .client
            .post(self.messages_url(phone_id))
            .bearer_auth(&self.token)
            .json(&text_payload(to, body))
            .send()
            .await
            .map_err(|e| DomainError::Messenger(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, "WhatsApp send failed");
            return Err(DomainError::Messenger(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Messenger(format!("Failed to parse API response: {}", e)))?;
        let message_id = sent.messages.into_iter().next().map(|m| m.id);
        info!(message_id = ?message_id, "WhatsApp message sent");
        Ok(message_id)
    }
}

/// Offline messenger: logs replies instead of sending them.
pub struct LogMessenger;

#[async_trait::async_trait]
impl MessengerPort for LogMessenger {
    async fn send_text(
        &self,
        from_phone_id: Option<&str>,
        _to: &str,
        body: &str,
    ) -> Result<Option<String>, DomainError> {
        info!(
            from = from_phone_id.unwrap_or("-"),
            body_len = body.len(),
            "WhatsApp not configured, reply logged only"
        );
        Ok(None)
    }
}
