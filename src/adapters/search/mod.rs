//! Web search adapters. Implement WebSearchPort.

pub mod serpapi;

pub use serpapi::SerpApiSearch;

use crate::domain::{DomainError, WebHit};
use crate::ports::WebSearchPort;
use tracing::debug;

/// Used when no search API key is configured: always returns no hits.
pub struct DisabledWebSearch;

#[async_trait::async_trait]
impl WebSearchPort for DisabledWebSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<WebHit>, DomainError> {
        debug!(query_len = query.len(), "web search disabled, returning no hits");
        Ok(Vec::new())
    }
}
