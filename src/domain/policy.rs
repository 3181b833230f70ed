//! Reply policy constants. Loaded from configuration, passed into the orchestrator.

use serde::{Deserialize, Serialize};

/// Thresholds and limits that steer the reply pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyPolicy {
    /// Number of internal knowledge hits to request.
    pub top_k: usize,
    /// Web search runs when the best internal score is below this.
    pub min_relevance: f32,
    /// Web search runs when fewer internal hits than this come back.
    pub min_results: usize,
    /// Maximum web hits merged into the retrieval result.
    pub web_results: usize,
    /// Web query is the collapsed message text cut to this many characters.
    pub web_query_max_chars: usize,
    /// Internal snippets included in the generation prompt.
    pub prompt_internal_snippets: usize,
    /// Web snippets included in the generation prompt.
    pub prompt_web_snippets: usize,
    /// Each snippet is cut to this many characters inside the prompt.
    pub snippet_chars: usize,
    /// Confidence when the model reports none and at least one snippet was used.
    pub confidence_with_context: u8,
    /// Confidence when the model reports none and nothing was retrieved.
    pub confidence_without_context: u8,
    /// Ask the language model for the intent label instead of the keyword heuristic.
    pub model_intent: bool,
    pub temperature: f32,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: 0.30,
            min_results: 2,
            web_results: 5,
            web_query_max_chars: 256,
            prompt_internal_snippets: 3,
            prompt_web_snippets: 2,
            snippet_chars: 200,
            confidence_with_context: 85,
            confidence_without_context: 60,
            model_intent: false,
            temperature: 0.7,
        }
    }
}
