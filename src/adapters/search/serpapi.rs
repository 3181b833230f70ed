//! SerpAPI (Google engine) adapter. Implements WebSearchPort.

use crate::domain::{DomainError, WebHit};
use crate::ports::WebSearchPort;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const SERPAPI_URL: &str = "https://serpapi.com/search";

/// Web search via SerpAPI.
///
/// Knowledge-graph and answer-box entries are ranked ahead of organic results.
pub struct SerpApiSearch {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    /// Google `gl` country code (e.g. "lk").
    country: String,
    /// Google `hl` interface language.
    language: String,
}

impl SerpApiSearch {
    pub fn new(
        api_key: String,
        country: String,
        language: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: SERPAPI_URL.to_string(),
            api_key,
            country,
            language,
        })
    }

    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }
}

#[derive(Deserialize, Default)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Flatten a SerpAPI payload into ranked hits, dropping entries without text.
fn parse_results(data: SerpResponse, limit: usize) -> Vec<WebHit> {
    let mut hits = Vec::new();

    if let Some(kg) = data.knowledge_graph {
        hits.push(WebHit {
            title: kg.title.unwrap_or_else(|| "Knowledge".to_string()),
            snippet: kg.description.unwrap_or_default(),
            url: kg.website.unwrap_or_default(),
        });
    }
    if let Some(ab) = data.answer_box {
        hits.push(WebHit {
            title: ab.title.unwrap_or_else(|| "Answer".to_string()),
            snippet: ab.answer.or(ab.snippet).unwrap_or_default(),
            url: ab.link.unwrap_or_default(),
        });
    }
    hits.extend(data.organic_results.into_iter().map(|r| WebHit {
        title: r.title,
        snippet: r.snippet,
        url: r.link,
    }));

    hits.retain(|h| !h.snippet.trim().is_empty());
    hits.truncate(limit);
    hits
}

#[async_trait::async_trait]
impl WebSearchPort for SerpApiSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, DomainError> {
        let num = limit.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("engine", "google"),
                ("num", num.as_str()),
                ("hl", self.language.as_str()),
                ("gl", self.country.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DomainError::RetrievalUnavailable(format!("web search request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "web search API returned error");
            return Err(DomainError::RetrievalUnavailable(format!(
                "web search API error {}",
                status
            )));
        }

        let data: SerpResponse = response.json().await.map_err(|e| {
            DomainError::RetrievalUnavailable(format!("web search response: {}", e))
        })?;
        let hits = parse_results(data, limit);
        info!(results = hits.len(), "web search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranks_knowledge_graph_and_answer_box_first() {
        let data: SerpResponse = serde_json::from_value(serde_json::json!({
            "organic_results": [
                {"title": "Bakery A", "link": "https://a.lk", "snippet": "Cakes and buns"},
                {"title": "Bakery B", "link": "https://b.lk", "snippet": "Fresh bread"}
            ],
            "answer_box": {"title": "Hours", "answer": "Open 8am-8pm"},
            "knowledge_graph": {"title": "Lanka Bakes", "website": "https://lb.lk", "description": "Bakery in Kandy"}
        }))
        .unwrap();
        let hits = parse_results(data, 5);
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].title, "Lanka Bakes");
        assert_eq!(hits[1].snippet, "Open 8am-8pm");
        assert_eq!(hits[2].url, "https://a.lk");
    }

    #[test]
    fn test_parse_respects_limit_and_drops_empty() {
        let data: SerpResponse = serde_json::from_value(serde_json::json!({
            "organic_results": [
                {"title": "x", "link": "l1", "snippet": ""},
                {"title": "y", "link": "l2", "snippet": "one"},
                {"title": "z", "link": "l3", "snippet": "two"},
                {"title": "w", "link": "l4", "snippet": "three"}
            ]
        }))
        .unwrap();
        let hits = parse_results(data, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "one");
    }

    #[test]
    fn test_parse_empty_payload() {
        let data: SerpResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_results(data, 5).is_empty());
    }
}
