//! Translation adapters: reuse the language model, or call the MyMemory translation API.

use crate::domain::{DomainError, Language};
use crate::ports::{LlmPort, TranslatorPort};
use crate::usecases::prompt::translation_request;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MYMEMORY_URL: &str = "https://api.mymemory.translated.net/get";

/// Translator backed by the configured language model.
pub struct LlmTranslator {
    llm: Arc<dyn LlmPort>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self { llm }
    }
}

#[async_trait::async_trait]
impl TranslatorPort for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<String, DomainError> {
        let completion = self
            .llm
            .complete(&translation_request(text, from, to))
            .await
            .map_err(|e| DomainError::TranslationFailed(e.to_string()))?;
        Ok(completion.text)
    }
}

/// MyMemory public translation API.
pub struct MyMemoryTranslator {
    client: reqwest::Client,
    api_url: String,
    /// Contact email raises the free daily quota.
    contact_email: Option<String>,
}

impl MyMemoryTranslator {
    pub fn new(contact_email: Option<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: MYMEMORY_URL.to_string(),
            contact_email,
        })
    }

    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }
}

#[derive(Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: MyMemoryData,
    #[serde(rename = "responseStatus", default)]
    response_status: serde_json::Value,
}

#[derive(Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText", default)]
    translated_text: String,
}

/// MyMemory reports status as a number or a numeric string.
fn status_ok(status: &serde_json::Value) -> bool {
    match status {
        serde_json::Value::Number(n) => n.as_u64() == Some(200),
        serde_json::Value::String(s) => s == "200",
        serde_json::Value::Null => true,
        _ => false,
    }
}

#[async_trait::async_trait]
impl TranslatorPort for MyMemoryTranslator {
    async fn translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<String, DomainError> {
        let langpair = format!("{}|{}", from.code(), to.code());
        let mut params = vec![("q", text.to_string()), ("langpair", langpair)];
        if let Some(email) = &self.contact_email {
            params.push(("de", email.clone()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| DomainError::TranslationFailed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "translation API returned error");
            return Err(DomainError::TranslationFailed(format!("API error {}", status)));
        }

        let parsed: MyMemoryResponse = response.json().await.map_err(|e| {
            DomainError::TranslationFailed(format!("Failed to parse API response: {}", e))
        })?;
        if !status_ok(&parsed.response_status) {
            return Err(DomainError::TranslationFailed(format!(
                "translation rejected: {}",
                parsed.response_status
            )));
        }

        info!(
            original_len = text.len(),
            translated_len = parsed.response_data.translated_text.len(),
            "text translated"
        );
        Ok(parsed.response_data.translated_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Completion, CompletionRequest};
    use std::sync::Mutex;

    struct RecordingLlm {
        seen: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmPort for RecordingLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(Completion {
                text: "ආයුබෝවන්".into(),
                confidence: None,
            })
        }
    }

    #[tokio::test]
    async fn test_llm_translator_builds_translation_prompt() {
        let llm = Arc::new(RecordingLlm {
            seen: Mutex::new(None),
        });
        let t = LlmTranslator::new(llm.clone());
        let out = t.translate("Hello", Language::En, Language::Si).await.unwrap();
        assert_eq!(out, "ආයුබෝවන්");
        let req = llm.seen.lock().unwrap().clone().unwrap();
        assert!(req.system.contains("from English to Sinhala"));
        assert_eq!(req.user, "Hello");
        assert!(!req.structured);
    }

    #[test]
    fn test_mymemory_status_parsing() {
        assert!(status_ok(&serde_json::json!(200)));
        assert!(status_ok(&serde_json::json!("200")));
        assert!(!status_ok(&serde_json::json!(403)));
        let parsed: MyMemoryResponse = serde_json::from_str(
            r#"{"responseData":{"translatedText":"ස්තූතියි"},"responseStatus":200}"#,
        )
        .unwrap();
        assert_eq!(parsed.response_data.translated_text, "ස්තූතියි");
    }
}
