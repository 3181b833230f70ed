//! Application configuration. API credentials, paths, reply thresholds.
//!
//! Every key is read from `WA_AGENT_<KEY>` (e.g. `WA_AGENT_LLM_API_KEY`) or from
//! the optional file named by `WA_AGENT_CONFIG`.

use crate::domain::{ReplyPolicy, TextSplitter};
use crate::usecases::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Default capacity of the reply job channel. When full, producers wait on send().await.
pub const DEFAULT_REPLY_QUEUE_SIZE: usize = 256;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub data_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Language model
    // ─────────────────────────────────────────────────────────────────────────
    /// Chat completions API key. Unset selects the mock model.
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default)]
    pub llm_api_url: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Embeddings
    // ─────────────────────────────────────────────────────────────────────────
    /// Embeddings API key. Falls back to the LLM key; unset selects the local hashing embedder.
    #[serde(default)]
    pub embeddings_api_key: Option<String>,
    #[serde(default)]
    pub embeddings_api_url: Option<String>,
    #[serde(default)]
    pub embeddings_model: Option<String>,
    /// Dimensions of the local hashing embedder.
    #[serde(default)]
    pub embedding_dims: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,

    // ─────────────────────────────────────────────────────────────────────────
    // Web search (SerpAPI) and translation
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub serpapi_key: Option<String>,
    /// Google `gl` country. Defaults to "lk".
    #[serde(default)]
    pub search_country: Option<String>,
    #[serde(default)]
    pub search_language: Option<String>,
    /// "llm" (default) or "mymemory".
    #[serde(default)]
    pub translator: Option<String>,
    #[serde(default)]
    pub translator_email: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // WhatsApp Cloud API
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub whatsapp_token: Option<String>,
    /// Sender number for tenants registered without one.
    #[serde(default)]
    pub whatsapp_phone_id: Option<String>,
    #[serde(default)]
    pub whatsapp_graph_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Reply worker
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub worker_concurrency: Option<usize>,
    #[serde(default)]
    pub reply_queue_size: Option<usize>,
    #[serde(default)]
    pub retry_max_attempts: Option<u32>,
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Reply policy overrides (see ReplyPolicy for meaning and defaults)
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub min_relevance: Option<f32>,
    #[serde(default)]
    pub min_results: Option<usize>,
    #[serde(default)]
    pub web_results: Option<usize>,
    #[serde(default)]
    pub web_query_max_chars: Option<usize>,
    #[serde(default)]
    pub prompt_internal_snippets: Option<usize>,
    #[serde(default)]
    pub prompt_web_snippets: Option<usize>,
    #[serde(default)]
    pub snippet_chars: Option<usize>,
    #[serde(default)]
    pub confidence_with_context: Option<u8>,
    #[serde(default)]
    pub confidence_without_context: Option<u8>,
    #[serde(default)]
    pub model_intent: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("WA_AGENT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        // Environment wins over the file.
        c = c.add_source(config::Environment::with_prefix("WA_AGENT"));
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> String {
        non_empty(&self.data_dir).unwrap_or_else(|| "./data".to_string())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(30).max(1))
    }

    pub fn llm_api_key(&self) -> Option<String> {
        non_empty(&self.llm_api_key)
    }

    /// Defaults to the OpenAI chat completions endpoint.
    pub fn llm_api_url_or_default(&self) -> String {
        non_empty(&self.llm_api_url)
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string())
    }

    pub fn llm_model_or_default(&self) -> String {
        non_empty(&self.llm_model).unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn is_llm_configured(&self) -> bool {
        self.llm_api_key().is_some()
    }

    pub fn embeddings_api_key(&self) -> Option<String> {
        non_empty(&self.embeddings_api_key).or_else(|| self.llm_api_key())
    }

    pub fn embeddings_api_url_or_default(&self) -> String {
        non_empty(&self.embeddings_api_url)
            .unwrap_or_else(|| "https://api.openai.com/v1/embeddings".to_string())
    }

    pub fn embeddings_model_or_default(&self) -> String {
        non_empty(&self.embeddings_model).unwrap_or_else(|| "text-embedding-3-small".to_string())
    }

    pub fn embedding_dims_or_default(&self) -> usize {
        self.embedding_dims.unwrap_or(384)
    }

    pub fn splitter(&self) -> TextSplitter {
        TextSplitter::new(
            self.chunk_size
                .unwrap_or(crate::domain::splitter::DEFAULT_CHUNK_SIZE),
            self.chunk_overlap
                .unwrap_or(crate::domain::splitter::DEFAULT_CHUNK_OVERLAP),
        )
    }

    pub fn serpapi_key(&self) -> Option<String> {
        non_empty(&self.serpapi_key)
    }

    pub fn search_country_or_default(&self) -> String {
        non_empty(&self.search_country).unwrap_or_else(|| "lk".to_string())
    }

    pub fn search_language_or_default(&self) -> String {
        non_empty(&self.search_language).unwrap_or_else(|| "en".to_string())
    }

    /// True when the MyMemory API is selected instead of the language model.
    pub fn use_mymemory_translator(&self) -> bool {
        non_empty(&self.translator).is_some_and(|t| t.eq_ignore_ascii_case("mymemory"))
    }

    pub fn translator_email(&self) -> Option<String> {
        non_empty(&self.translator_email)
    }

    pub fn whatsapp_token(&self) -> Option<String> {
        non_empty(&self.whatsapp_token)
    }

    pub fn whatsapp_phone_id(&self) -> Option<String> {
        non_empty(&self.whatsapp_phone_id)
    }

    pub fn whatsapp_graph_url(&self) -> Option<String> {
        non_empty(&self.whatsapp_graph_url)
    }

    pub fn worker_concurrency_or_default(&self) -> usize {
        self.worker_concurrency.unwrap_or(4).max(1)
    }

    pub fn reply_queue_size_or_default(&self) -> usize {
        self.reply_queue_size
            .unwrap_or(DEFAULT_REPLY_QUEUE_SIZE)
            .max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.retry_max_attempts.unwrap_or(default.max_attempts).max(1),
            base_delay: self
                .retry_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.base_delay),
        }
    }

    /// Reply policy with configured overrides applied on top of the defaults.
    pub fn reply_policy(&self) -> ReplyPolicy {
        let d = ReplyPolicy::default();
        ReplyPolicy {
            top_k: self.top_k.unwrap_or(d.top_k),
            min_relevance: self.min_relevance.unwrap_or(d.min_relevance),
            min_results: self.min_results.unwrap_or(d.min_results),
            web_results: self.web_results.unwrap_or(d.web_results),
            web_query_max_chars: self.web_query_max_chars.unwrap_or(d.web_query_max_chars),
            prompt_internal_snippets: self
                .prompt_internal_snippets
                .unwrap_or(d.prompt_internal_snippets),
            prompt_web_snippets: self.prompt_web_snippets.unwrap_or(d.prompt_web_snippets),
            snippet_chars: self.snippet_chars.unwrap_or(d.snippet_chars),
            confidence_with_context: self
                .confidence_with_context
                .unwrap_or(d.confidence_with_context)
                .min(100),
            confidence_without_context: self
                .confidence_without_context
                .unwrap_or(d.confidence_without_context)
                .min(100),
            model_intent: self.model_intent.unwrap_or(d.model_intent),
            temperature: self.temperature.unwrap_or(d.temperature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.data_dir_or_default(), "./data");
        assert!(!cfg.is_llm_configured());
        assert_eq!(cfg.reply_policy(), ReplyPolicy::default());
        assert_eq!(cfg.retry_policy().max_attempts, 3);
        assert_eq!(cfg.reply_queue_size_or_default(), DEFAULT_REPLY_QUEUE_SIZE);
        assert!(!cfg.use_mymemory_translator());
    }

    #[test]
    fn test_policy_overrides() {
        let cfg = AppConfig {
            min_relevance: Some(0.5),
            min_results: Some(1),
            confidence_with_context: Some(150),
            ..AppConfig::default()
        };
        let p = cfg.reply_policy();
        assert_eq!(p.min_relevance, 0.5);
        assert_eq!(p.min_results, 1);
        assert_eq!(p.confidence_with_context, 100);
        assert_eq!(p.top_k, 5);
    }

    #[test]
    fn test_blank_keys_count_as_unset() {
        let cfg = AppConfig {
            llm_api_key: Some("   ".into()),
            embeddings_api_key: None,
            ..AppConfig::default()
        };
        assert!(!cfg.is_llm_configured());
        assert!(cfg.embeddings_api_key().is_none());

        let cfg = AppConfig {
            llm_api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert_eq!(cfg.embeddings_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_config_crate_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "top_k = 8\nserpapi_key = \"abc\"\ntranslator = \"mymemory\"\n").unwrap();
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from(path.as_path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.reply_policy().top_k, 8);
        assert_eq!(cfg.serpapi_key().as_deref(), Some("abc"));
        assert!(cfg.use_mymemory_translator());
    }
}
