//! Vector store over the chunk table. Implements KnowledgePort.
//!
//! Brute-force cosine similarity across a tenant's chunks; tenants hold a few
//! hundred chunks at most, so no index is kept.

use crate::adapters::ai::cosine_similarity;
use crate::domain::{DomainError, KnowledgeScope, Snippet, SnippetOrigin};
use crate::ports::{ChunkStorePort, EmbeddingPort, KnowledgePort};
use std::sync::Arc;
use tracing::debug;

pub struct KnowledgeBase {
    store: Arc<dyn ChunkStorePort>,
    embedder: Arc<dyn EmbeddingPort>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn ChunkStorePort>, embedder: Arc<dyn EmbeddingPort>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait::async_trait]
impl KnowledgePort for KnowledgeBase {
    async fn search(
        &self,
        query: &str,
        scope: &KnowledgeScope,
        top_k: usize,
    ) -> Result<Vec<Snippet>, DomainError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| DomainError::RetrievalUnavailable(format!("query embedding: {}", e)))?;
        let chunks = self
            .store
            .load_chunks(scope)
            .await
            .map_err(|e| DomainError::RetrievalUnavailable(e.to_string()))?;

        let mut scored: Vec<Snippet> = chunks
            .into_iter()
            .map(|c| Snippet {
                origin: SnippetOrigin::Internal,
                score: cosine_similarity(&query_vec, &c.embedding),
                source: c.source,
                text: c.text,
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        debug!(
            tenant_id = scope.tenant_id,
            results = scored.len(),
            top_score = scored.first().map(|s| s.score).unwrap_or(0.0),
            "internal knowledge search"
        );
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::HashingEmbedder;
    use crate::domain::KnowledgeChunk;
    use std::sync::Mutex;

    struct MemoryStore {
        chunks: Mutex<Vec<KnowledgeChunk>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ChunkStorePort for MemoryStore {
        async fn replace_chunks(
            &self,
            tenant_id: i64,
            source: &str,
            chunks: &[KnowledgeChunk],
        ) -> Result<(), DomainError> {
            let mut all = self.chunks.lock().unwrap();
            all.retain(|c| !(c.tenant_id == tenant_id && c.source == source));
            all.extend_from_slice(chunks);
            Ok(())
        }

        async fn load_chunks(
            &self,
            scope: &KnowledgeScope,
        ) -> Result<Vec<KnowledgeChunk>, DomainError> {
            if self.fail {
                return Err(DomainError::Repo("disk gone".into()));
            }
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.tenant_id == scope.tenant_id)
                .filter(|c| scope.sources.is_empty() || scope.sources.contains(&c.source))
                .cloned()
                .collect())
        }

        async fn delete_source(&self, _tenant_id: i64, _source: &str) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    fn chunk(embedder: &HashingEmbedder, tenant_id: i64, seq: u32, text: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            tenant_id,
            source: "menu".into(),
            seq,
            text: text.into(),
            embedding: embedder.embed_text(text),
        }
    }

    fn base(chunks: Vec<KnowledgeChunk>, fail: bool) -> KnowledgeBase {
        KnowledgeBase::new(
            Arc::new(MemoryStore {
                chunks: Mutex::new(chunks),
                fail,
            }),
            Arc::new(HashingEmbedder::default()),
        )
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity_and_limits() {
        let e = HashingEmbedder::default();
        let kb = base(
            vec![
                chunk(&e, 1, 0, "Opening hours are 8am to 8pm every day"),
                chunk(&e, 1, 1, "Chocolate cake price is 2500 rupees"),
                chunk(&e, 1, 2, "We deliver within Kandy city"),
            ],
            false,
        );
        let scope = KnowledgeScope { tenant_id: 1, sources: vec![] };
        let hits = kb.search("chocolate cake price", &scope, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("Chocolate"));
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].origin, SnippetOrigin::Internal);
    }

    #[tokio::test]
    async fn test_search_is_tenant_scoped() {
        let e = HashingEmbedder::default();
        let kb = base(vec![chunk(&e, 2, 0, "Chocolate cake price")], false);
        let scope = KnowledgeScope { tenant_id: 1, sources: vec![] };
        assert!(kb.search("chocolate cake", &scope, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_retrieval_unavailable() {
        let kb = base(vec![], true);
        let scope = KnowledgeScope { tenant_id: 1, sources: vec![] };
        assert!(matches!(
            kb.search("cake", &scope, 5).await,
            Err(DomainError::RetrievalUnavailable(_))
        ));
    }
}
