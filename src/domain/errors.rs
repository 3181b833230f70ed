//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Empty or malformed inbound message. Recovered by the orchestrator with a clarification reply.
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// Vector or web search failed. Recovered by continuing with fewer results.
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Language model call failed or returned nothing during generation. Fatal for the request.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Translation failed. Recovered by delivering the untranslated draft.
    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Messenger error: {0}")]
    Messenger(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The reply worker is gone; queued work would never be picked up.
    #[error("Reply queue closed: {0}")]
    QueueClosed(String),
}

impl DomainError {
    /// True when a caller may retry the whole request (transient upstream failure).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::GenerationFailed(_) | DomainError::Llm(_) | DomainError::Messenger(_)
        )
    }
}
