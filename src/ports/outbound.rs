//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    DomainError, InboundMessage, KnowledgeChunk, KnowledgeScope, Language, ReplyOutcome, Snippet,
    StoredMessage, TenantProfile, WebHit,
};

/// A single prompt for the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask for a JSON object `{"reply": ..., "confidence": ...}` and parse it.
    pub structured: bool,
}

/// Language model output: text plus an optional self-reported confidence (0–100).
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub confidence: Option<u8>,
}

/// Language model service. Used for analysis, generation and translation.
#[async_trait::async_trait]
pub trait LlmPort: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError>;
}

/// Text embedding service.
#[async_trait::async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embed several texts in one call. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| DomainError::Embedding("empty embedding response".to_string()))
    }
}

/// Similarity search over a tenant's knowledge.
#[async_trait::async_trait]
pub trait KnowledgePort: Send + Sync {
    /// Return at most `top_k` snippets ordered by descending relevance score.
    async fn search(
        &self,
        query: &str,
        scope: &KnowledgeScope,
        top_k: usize,
    ) -> Result<Vec<Snippet>, DomainError>;
}

/// Storage backing the vector store: chunk text plus embeddings.
#[async_trait::async_trait]
pub trait ChunkStorePort: Send + Sync {
    /// Replace every chunk of (`tenant_id`, `source`) with `chunks`.
    async fn replace_chunks(
        &self,
        tenant_id: i64,
        source: &str,
        chunks: &[KnowledgeChunk],
    ) -> Result<(), DomainError>;

    /// Load chunks in scope. Empty `scope.sources` means every source of the tenant.
    async fn load_chunks(&self, scope: &KnowledgeScope) -> Result<Vec<KnowledgeChunk>, DomainError>;

    /// Delete a source. Returns the number of chunks removed.
    async fn delete_source(&self, tenant_id: i64, source: &str) -> Result<u64, DomainError>;
}

/// Web search service.
#[async_trait::async_trait]
pub trait WebSearchPort: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, DomainError>;
}

/// Translation service.
#[async_trait::async_trait]
pub trait TranslatorPort: Send + Sync {
    async fn translate(&self, text: &str, from: Language, to: Language)
    -> Result<String, DomainError>;
}

/// Tenant configuration store.
#[async_trait::async_trait]
pub trait TenantPort: Send + Sync {
    async fn get_profile(&self, tenant_id: i64) -> Result<Option<TenantProfile>, DomainError>;

    /// Resolve the tenant owning a WhatsApp Business phone-number id.
    async fn find_by_phone_id(&self, phone_id: &str)
    -> Result<Option<TenantProfile>, DomainError>;

    /// Insert or update. Returns the tenant id (assigned when `profile.tenant_id` is 0).
    async fn upsert_profile(&self, profile: &TenantProfile) -> Result<i64, DomainError>;

    async fn list_profiles(&self) -> Result<Vec<TenantProfile>, DomainError>;
}

/// Durable message log. Outcomes are keyed to the originating inbound message.
#[async_trait::async_trait]
pub trait MessageStorePort: Send + Sync {
    /// Store an inbound message with status `received`. Returns its id.
    async fn record_inbound(&self, message: &InboundMessage) -> Result<i64, DomainError>;

    async fn mark_processing(&self, message_id: i64) -> Result<(), DomainError>;

    /// Attach the outcome and set status `responded`.
    async fn save_outcome(&self, message_id: i64, outcome: &ReplyOutcome)
    -> Result<(), DomainError>;

    async fn mark_failed(&self, message_id: i64, reason: &str) -> Result<(), DomainError>;

    /// Most recent messages of a tenant, newest first.
    async fn recent_messages(
        &self,
        tenant_id: i64,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, DomainError>;
}

/// Outbound chat channel (WhatsApp Business API).
#[async_trait::async_trait]
pub trait MessengerPort: Send + Sync {
    /// Send a text message from the tenant's business number (`from_phone_id`; `None` uses the
    /// adapter default). Returns the provider message id when one is reported.
    async fn send_text(
        &self,
        from_phone_id: Option<&str>,
        to: &str,
        body: &str,
    ) -> Result<Option<String>, DomainError>;
}
