//! Core domain layer. No external I/O dependencies.
//!
//! Entities, language heuristics and the reply policy live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod language;
pub mod policy;
pub mod splitter;

pub use entities::{
    Degradation, InboundMessage, Intent, KnowledgeChunk, KnowledgeScope, Language, MessageStatus,
    ReplyOutcome, RetrievalResult, Snippet, SnippetOrigin, StoredMessage, TenantProfile, WebHit,
};
pub use errors::DomainError;
pub use policy::ReplyPolicy;
pub use splitter::TextSplitter;
