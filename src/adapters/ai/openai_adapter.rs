//! OpenAI-compatible chat-completions adapter.
//!
//! Supports OpenAI API, Azure OpenAI, GitHub Models and local Ollama instances.
//! Implements `LlmPort` with robust JSON parsing and markdown stripping.

use crate::domain::DomainError;
use crate::ports::{Completion, CompletionRequest, LlmPort};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI-compatible chat adapter.
///
/// Can be configured to work with:
/// - OpenAI API (api.openai.com)
/// - Azure OpenAI / GitHub Models (models.github.ai)
/// - Ollama (localhost)
/// - Any OpenAI-compatible API
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `api_url` - Chat completions endpoint (e.g., "https://api.openai.com/v1/chat/completions")
    /// * `api_key` - API key (can be empty for local Ollama)
    /// * `model` - Model name (e.g., "gpt-4o-mini", "llama3.2")
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            api_key: api_key.trim().to_string(),
            model,
        })
    }

    /// Sanitize JSON response from LLM.
    ///
    /// LLMs sometimes wrap JSON in markdown code blocks. This strips them.
    pub(crate) fn sanitize_json(raw_text: &str) -> String {
        let trimmed = raw_text.trim();

        // Handle markdown code blocks: ```json ... ``` or ``` ... ```
        if trimmed.starts_with("```") {
            let without_prefix = if trimmed.starts_with("```json") {
                trimmed.strip_prefix("```json").unwrap_or(trimmed)
            } else {
                trimmed.strip_prefix("```").unwrap_or(trimmed)
            };

            if let Some(end_idx) = without_prefix.rfind("```") {
                return without_prefix[..end_idx].trim().to_string();
            }
            return without_prefix.trim().to_string();
        }

        if let Some(start) = trimmed.find('{') {
            if let Some(end) = trimmed.rfind('}') {
                if start < end {
                    return trimmed[start..=end].to_string();
                }
            }
        }

        trimmed.to_string()
    }

    /// Parse a structured `{reply, confidence}` answer.
    ///
    /// Falls back to the raw text with no confidence when the model ignored the format.
    pub(crate) fn parse_structured(raw: &str) -> Completion {
        let clean = Self::sanitize_json(raw);
        match serde_json::from_str::<StructuredReply>(&clean) {
            Ok(r) if !r.reply.trim().is_empty() => Completion {
                text: r.reply.trim().to_string(),
                confidence: r.confidence.map(|c| c.clamp(0.0, 100.0).round() as u8),
            },
            Ok(_) => Completion {
                text: String::new(),
                confidence: None,
            },
            Err(e) => {
                debug!(error = %e, "structured reply not parseable, using raw text");
                Completion {
                    text: raw.trim().to_string(),
                    confidence: None,
                }
            }
        }
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Generation answer schema requested in the prompt.
#[derive(Deserialize)]
struct StructuredReply {
    reply: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[async_trait::async_trait]
impl LlmPort for OpenAiAdapter {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: request.temperature,
            response_format: request.structured.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let mut http = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            http = http.bearer_auth(&self.api_key);
        }
        let response = http
            .send()
            .await
            .map_err(|e| DomainError::Llm(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "LLM API returned error");
            return Err(DomainError::Llm(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Llm(format!("Failed to parse API response: {}", e)))?;

        let raw = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::Llm("No response choices returned".to_string()))?;

        debug!(raw_len = raw.len(), structured = request.structured, "received LLM response");

        if request.structured {
            Ok(Self::parse_structured(&raw))
        } else {
            Ok(Completion {
                text: raw.trim().to_string(),
                confidence: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_json_clean() {
        let input = r#"{"reply": "test"}"#;
        assert_eq!(OpenAiAdapter::sanitize_json(input), input);
    }

    #[test]
    fn test_sanitize_json_markdown() {
        let input = r#"```json
{"reply": "test"}
```"#;
        assert_eq!(OpenAiAdapter::sanitize_json(input), r#"{"reply": "test"}"#);
    }

    #[test]
    fn test_sanitize_json_with_text() {
        let input = r#"Here is the answer:
{"reply": "test", "confidence": 80}"#;
        assert_eq!(
            OpenAiAdapter::sanitize_json(input),
            r#"{"reply": "test", "confidence": 80}"#
        );
    }

    #[test]
    fn test_parse_structured_with_confidence() {
        let c = OpenAiAdapter::parse_structured(r#"{"reply": " We open at 9. ", "confidence": 91.6}"#);
        assert_eq!(c.text, "We open at 9.");
        assert_eq!(c.confidence, Some(92));
    }

    #[test]
    fn test_parse_structured_clamps_confidence() {
        let c = OpenAiAdapter::parse_structured(r#"{"reply": "ok", "confidence": 400}"#);
        assert_eq!(c.confidence, Some(100));
    }

    #[test]
    fn test_parse_structured_plain_text_fallback() {
        let c = OpenAiAdapter::parse_structured("We open at 9 every day.");
        assert_eq!(c.text, "We open at 9 every day.");
        assert_eq!(c.confidence, None);
    }

    #[test]
    fn test_parse_structured_empty_reply() {
        let c = OpenAiAdapter::parse_structured(r#"{"reply": ""}"#);
        assert!(c.text.is_empty());
    }
}
