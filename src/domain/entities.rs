//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; adapters map into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A message received from a customer over WhatsApp. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: i64,
    /// Sender identifier (WhatsApp phone number in E.164 without `+`).
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Provider message id (`wamid...`), when the message came through the webhook.
    #[serde(default)]
    pub provider_message_id: Option<String>,
}

impl InboundMessage {
    pub fn new(tenant_id: i64, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tenant_id,
            sender: sender.into(),
            text: text.into(),
            received_at: Utc::now(),
            provider_message_id: None,
        }
    }
}

/// Language codes the agent knows how to detect and name in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Si,
    Ta,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Si => "si",
            Language::Ta => "ta",
        }
    }

    /// Human-readable name used inside prompts.
    pub fn name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Si => "Sinhala",
            Language::Ta => "Tamil",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "si" => Some(Language::Si),
            "ta" => Some(Language::Ta),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Per-tenant configuration the orchestrator reads. Owned by the tenant store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantProfile {
    pub tenant_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub persona: String,
    pub supported_languages: Vec<Language>,
    pub default_language: Language,
    /// Knowledge source identifiers (document ids). Empty = every source of the tenant.
    #[serde(default)]
    pub knowledge_sources: Vec<String>,
    /// WhatsApp Business phone-number id that routes webhooks to this tenant.
    #[serde(default)]
    pub whatsapp_phone_id: Option<String>,
}

impl TenantProfile {
    pub fn supports(&self, language: Language) -> bool {
        language == self.default_language || self.supported_languages.contains(&language)
    }

    pub fn knowledge_scope(&self) -> KnowledgeScope {
        KnowledgeScope {
            tenant_id: self.tenant_id,
            sources: self.knowledge_sources.clone(),
        }
    }
}

/// Which part of a tenant's knowledge a similarity query may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeScope {
    pub tenant_id: i64,
    pub sources: Vec<String>,
}

/// Where a retrieved snippet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetOrigin {
    Internal,
    Web,
}

/// A retrieved chunk of text. Web hits carry no relevance score (0.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub origin: SnippetOrigin,
    /// Knowledge source id for internal hits, URL for web hits.
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// One web search hit as returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Ordered retrieval results for one request: internal hits first, web hits after.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    snippets: Vec<Snippet>,
}

impl RetrievalResult {
    /// Build from internal hits, ordering them by descending score.
    pub fn from_internal(mut hits: Vec<Snippet>) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { snippets: hits }
    }

    /// Append web hits after every internal hit, keeping provider order.
    pub fn merge_web(&mut self, hits: Vec<WebHit>) {
        self.snippets.extend(hits.into_iter().map(|h| Snippet {
            origin: SnippetOrigin::Web,
            source: h.url,
            text: if h.title.is_empty() {
                h.snippet
            } else {
                format!("{}: {}", h.title, h.snippet)
            },
            score: 0.0,
        }));
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn internal(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets
            .iter()
            .filter(|s| s.origin == SnippetOrigin::Internal)
    }

    pub fn web(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets
            .iter()
            .filter(|s| s.origin == SnippetOrigin::Web)
    }

    pub fn internal_count(&self) -> usize {
        self.internal().count()
    }

    pub fn top_internal_score(&self) -> Option<f32> {
        self.internal().map(|s| s.score).reduce(f32::max)
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

/// Coarse intent label attached to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Pricing,
    Availability,
    Hours,
    Location,
    Order,
    Complaint,
    General,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Pricing => "pricing",
            Intent::Availability => "availability",
            Intent::Hours => "hours",
            Intent::Location => "location",
            Intent::Order => "order",
            Intent::Complaint => "complaint",
            Intent::General => "general",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let l = label
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_lowercase();
        match l.as_str() {
            "greeting" => Some(Intent::Greeting),
            "pricing" | "price" => Some(Intent::Pricing),
            "availability" | "stock" => Some(Intent::Availability),
            "hours" => Some(Intent::Hours),
            "location" => Some(Intent::Location),
            "order" => Some(Intent::Order),
            "complaint" => Some(Intent::Complaint),
            "general" => Some(Intent::General),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A recovered, non-fatal failure that shaped the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Degradation {
    /// Model-based intent analysis failed; the local heuristic was used.
    AnalysisFallback(String),
    /// Internal knowledge search failed; continued without internal hits.
    InternalSearchUnavailable(String),
    /// Web search failed; continued without web hits.
    WebSearchUnavailable(String),
    /// Translation failed; the draft was delivered untranslated.
    TranslationFailed(String),
}

/// Result of one orchestrator run. Persisted by the message store, not the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyOutcome {
    pub text: String,
    pub draft: String,
    pub detected_language: Language,
    pub target_language: Language,
    pub intent: Intent,
    /// 0–100.
    pub confidence: u8,
    pub elapsed_ms: u64,
    pub used_web_search: bool,
    pub translated: bool,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
}

/// A stored knowledge chunk with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeChunk {
    pub tenant_id: i64,
    pub source: String,
    pub seq: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Processing status of a stored inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Received,
    Processing,
    Responded,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Received => "received",
            MessageStatus::Processing => "processing",
            MessageStatus::Responded => "responded",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => MessageStatus::Processing,
            "responded" => MessageStatus::Responded,
            "failed" => MessageStatus::Failed,
            _ => MessageStatus::Received,
        }
    }
}

/// Message-log row as the dashboard and CSV export see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub tenant_id: i64,
    pub sender: String,
    pub text: String,
    pub received_at: i64,
    pub status: MessageStatus,
    pub reply: Option<String>,
    pub language: Option<String>,
    pub confidence: Option<u8>,
    pub processing_ms: Option<u64>,
    pub error: Option<String>,
}
