//! Mock LLM adapter for running without API calls.
//!
//! Returns canned responses for development and testing purposes.

use crate::domain::DomainError;
use crate::ports::{Completion, CompletionRequest, LlmPort};
use crate::usecases::prompt::truncate_chars;
use std::time::Duration;
use tracing::info;

/// Mock LLM adapter.
///
/// Returns predetermined responses without making API calls.
/// Simulates network latency with configurable delay.
pub struct MockLlmAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockLlmAdapter {
    /// Create a new mock adapter with default delay (100ms).
    pub fn new() -> Self {
        Self { delay_ms: 100 }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for MockLlmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmPort for MockLlmAdapter {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
        info!(
            prompt_len = request.system.len() + request.user.len(),
            structured = request.structured,
            "[MOCK] Simulating LLM completion"
        );

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        if request.structured {
            let has_context = !request.system.contains("(no additional information found)");
            Ok(Completion {
                text: format!(
                    "[MOCK] Thanks for your message \"{}\". A real model would answer here \
                     using the business context. Configure WA_AGENT_LLM_API_KEY for live replies.",
                    truncate_chars(&request.user, 60)
                ),
                confidence: Some(if has_context { 80 } else { 50 }),
            })
        } else {
            Ok(Completion {
                text: format!("[MOCK] {}", request.user.trim()),
                confidence: None,
            })
        }
    }
}
