//! Application use cases. Orchestrate domain logic via ports.

pub mod knowledge_service;
pub mod prompt;
pub mod reply_orchestrator;
pub mod reply_worker;

pub use knowledge_service::KnowledgeService;
pub use reply_orchestrator::{Branch, ReplyOrchestrator};
pub use reply_worker::{ReplyJob, ReplyQueue, ReplyWorker, RetryPolicy};
