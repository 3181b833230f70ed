//! AI adapter module. Implements LlmPort, EmbeddingPort and TranslatorPort.
//!
//! Provides OpenAI-compatible adapters, local fallbacks and a mock LLM for offline runs.

pub mod embeddings;
pub mod mock_adapter;
pub mod openai_adapter;
pub mod translator;

pub use embeddings::{HashingEmbedder, OpenAiEmbeddings, cosine_similarity};
pub use mock_adapter::MockLlmAdapter;
pub use openai_adapter::OpenAiAdapter;
pub use translator::{LlmTranslator, MyMemoryTranslator};
