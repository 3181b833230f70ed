//! Map WhatsApp Cloud API webhook payloads to domain entities.
//!
//! Status callbacks (delivered/read receipts) carry no `messages` array and map to nothing.

use crate::domain::InboundMessage;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One customer message extracted from a webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookMessage {
    pub message_id: String,
    pub from: String,
    pub sender_name: String,
    /// WhatsApp message type (`text`, `image`, `document`, ...).
    pub kind: String,
    pub timestamp: i64,
    /// Business phone-number id the message was sent to. Identifies the tenant.
    pub phone_number_id: Option<String>,
    pub content: String,
}

impl WebhookMessage {
    pub fn to_inbound(&self, tenant_id: i64) -> InboundMessage {
        let mut msg = InboundMessage::new(tenant_id, &self.from, &self.content);
        if self.timestamp > 0 {
            if let Some(ts) = DateTime::<Utc>::from_timestamp(self.timestamp, 0) {
                msg.received_at = ts;
            }
        }
        msg.provider_message_id = Some(self.message_id.clone());
        msg
    }
}

fn str_at<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Text the orchestrator sees for a message. Non-text types become a bracketed placeholder.
pub fn message_content(message: &Value) -> String {
    let kind = str_at(message, "/type").unwrap_or("text");
    match kind {
        "text" => str_at(message, "/text/body").unwrap_or_default().to_string(),
        "image" => format!(
            "[Image: {}]",
            str_at(message, "/image/caption").unwrap_or("No caption")
        ),
        "document" => format!(
            "[Document: {}]",
            str_at(message, "/document/filename").unwrap_or("Unknown")
        ),
        "audio" => "[Audio message]".to_string(),
        "video" => format!(
            "[Video: {}]",
            str_at(message, "/video/caption").unwrap_or("No caption")
        ),
        other => format!("[{} message]", capitalize(other)),
    }
}

/// Extract every customer message in a webhook payload, in delivery order.
pub fn parse_webhook(payload: &Value) -> Vec<WebhookMessage> {
    let mut out = Vec::new();
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for entry in entries {
        let changes = entry
            .get("changes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for change in changes {
            let Some(value) = change.get("value") else {
                continue;
            };
            let Some(messages) = value.get("messages").and_then(Value::as_array) else {
                continue;
            };
            let phone_number_id = str_at(value, "/metadata/phone_number_id").map(String::from);
            let sender_name = str_at(value, "/contacts/0/profile/name").unwrap_or("Unknown");

            for m in messages {
                let (Some(id), Some(from)) = (str_at(m, "/id"), str_at(m, "/from")) else {
                    continue;
                };
                // Timestamps arrive as decimal strings.
                let timestamp = match m.get("timestamp") {
                    Some(Value::String(s)) => s.parse().unwrap_or(0),
                    Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
                    _ => 0,
                };
                out.push(WebhookMessage {
                    message_id: id.to_string(),
                    from: from.to_string(),
                    sender_name: sender_name.to_string(),
                    kind: str_at(m, "/type").unwrap_or("text").to_string(),
                    timestamp,
                    phone_number_id: phone_number_id.clone(),
                    content: message_content(m),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(message: Value) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "94112345678", "phone_number_id": "1055"},
                        "contacts": [{"profile": {"name": "Nimal"}, "wa_id": "94771234567"}],
                        "messages": [message]
                    }
                }]
            }]
        })
    }

    #[test]
    fn test_parse_text_message() {
        let p = payload(json!({
            "from": "94771234567", "id": "wamid.1", "timestamp": "1717000000",
            "type": "text", "text": {"body": "Cake price?"}
        }));
        let msgs = parse_webhook(&p);
        assert_eq!(msgs.len(), 1);
        let m = &msgs[0];
        assert_eq!(m.content, "Cake price?");
        assert_eq!(m.sender_name, "Nimal");
        assert_eq!(m.phone_number_id.as_deref(), Some("1055"));
        assert_eq!(m.timestamp, 1_717_000_000);

        let inbound = m.to_inbound(4);
        assert_eq!(inbound.tenant_id, 4);
        assert_eq!(inbound.sender, "94771234567");
        assert_eq!(inbound.provider_message_id.as_deref(), Some("wamid.1"));
        assert_eq!(inbound.received_at.timestamp(), 1_717_000_000);
    }

    #[test]
    fn test_media_placeholders() {
        let image = json!({"type": "image", "image": {"caption": "our shop"}});
        assert_eq!(message_content(&image), "[Image: our shop]");
        let image_no_caption = json!({"type": "image", "image": {}});
        assert_eq!(message_content(&image_no_caption), "[Image: No caption]");
        let doc = json!({"type": "document", "document": {"filename": "menu.pdf"}});
        assert_eq!(message_content(&doc), "[Document: menu.pdf]");
        assert_eq!(message_content(&json!({"type": "audio"})), "[Audio message]");
        assert_eq!(
            message_content(&json!({"type": "video", "video": {"caption": "demo"}})),
            "[Video: demo]"
        );
        assert_eq!(message_content(&json!({"type": "sticker"})), "[Sticker message]");
    }

    #[test]
    fn test_status_callback_yields_nothing() {
        let p = json!({
            "entry": [{"changes": [{"value": {
                "metadata": {"phone_number_id": "1055"},
                "statuses": [{"id": "wamid.1", "status": "read"}]
            }}]}]
        });
        assert!(parse_webhook(&p).is_empty());
        assert!(parse_webhook(&json!({})).is_empty());
    }

    #[test]
    fn test_message_without_sender_is_skipped() {
        let p = payload(json!({"id": "wamid.2", "type": "text", "text": {"body": "hi"}}));
        assert!(parse_webhook(&p).is_empty());
    }
}
