//! Embedding adapters: OpenAI-compatible `/v1/embeddings` and a local feature-hashing embedder.

use crate::domain::DomainError;
use crate::ports::EmbeddingPort;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI-compatible embeddings provider.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    /// `api_url` is the full endpoint, e.g. "https://api.openai.com/v1/embeddings".
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            api_key: api_key.trim().to_string(),
            model,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingPort for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| DomainError::Embedding(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "embeddings API returned error");
            return Err(DomainError::Embedding(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Embedding(format!("Failed to parse API response: {}", e)))?;
        parsed.data.sort_by_key(|d| d.index);

        if parsed.data.len() != texts.len() {
            return Err(DomainError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        debug!(count = parsed.data.len(), "embeddings generated");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic local embedder: hashed word unigrams and character trigrams, L2-normalised.
///
/// No network; good enough for keyword-ish similarity in development and tests.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMS: usize = 384;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bucket(&self, feature: &str) -> usize {
        (fnv1a(feature.as_bytes()) % self.dims as u64) as usize
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        let lower = text.to_lowercase();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[self.bucket(word)] += 1.0;
            let chars: Vec<char> = format!("#{}#", word).chars().collect();
            for tri in chars.windows(3) {
                let gram: String = tri.iter().collect();
                v[self.bucket(&gram)] += 0.5;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait::async_trait]
impl EmbeddingPort for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Cosine similarity. Returns 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}
