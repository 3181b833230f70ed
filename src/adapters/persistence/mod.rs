//! Persistence adapters: SQLite repository and the vector store built on it.

pub mod knowledge_base;
pub mod sqlite_repo;

pub use knowledge_base::KnowledgeBase;
pub use sqlite_repo::SqliteRepo;
