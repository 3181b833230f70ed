//! Knowledge ingestion. Splits tenant documents into chunks, embeds them and
//! stores them for similarity search.

use crate::domain::{DomainError, KnowledgeChunk, TextSplitter};
use crate::ports::{ChunkStorePort, EmbeddingPort, TenantPort};
use std::sync::Arc;
use tracing::{info, warn};

/// Documents shorter than this (after trimming) carry no usable knowledge.
const MIN_DOCUMENT_CHARS: usize = 10;

pub struct KnowledgeService {
    store: Arc<dyn ChunkStorePort>,
    embedder: Arc<dyn EmbeddingPort>,
    tenants: Arc<dyn TenantPort>,
    splitter: TextSplitter,
}

impl KnowledgeService {
    pub fn new(
        store: Arc<dyn ChunkStorePort>,
        embedder: Arc<dyn EmbeddingPort>,
        tenants: Arc<dyn TenantPort>,
    ) -> Self {
        Self {
            store,
            embedder,
            tenants,
            splitter: TextSplitter::default(),
        }
    }

    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Replace the chunks of `source` with a freshly embedded copy of `text`.
    ///
    /// Returns the number of chunks stored. A tenant that restricts its
    /// knowledge sources gets `source` added to the list.
    pub async fn ingest_document(
        &self,
        tenant_id: i64,
        source: &str,
        text: &str,
    ) -> Result<usize, DomainError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(DomainError::InputInvalid("source name is empty".to_string()));
        }
        let content = text.trim();
        if content.chars().count() < MIN_DOCUMENT_CHARS {
            return Err(DomainError::InputInvalid(format!(
                "document '{}' has no usable content",
                source
            )));
        }
        let mut profile = self
            .tenants
            .get_profile(tenant_id)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(tenant_id.to_string()))?;

        let pieces = self.splitter.split(content);
        let embeddings = self.embedder.embed_batch(&pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(DomainError::Embedding(format!(
                "expected {} embeddings, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<KnowledgeChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(seq, (text, embedding))| KnowledgeChunk {
                tenant_id,
                source: source.to_string(),
                seq: seq as u32,
                text,
                embedding,
            })
            .collect();
        self.store.replace_chunks(tenant_id, source, &chunks).await?;

        if !profile.knowledge_sources.is_empty()
            && !profile.knowledge_sources.iter().any(|s| s == source)
        {
            profile.knowledge_sources.push(source.to_string());
            self.tenants.upsert_profile(&profile).await?;
        }

        info!(tenant_id, source, chunks = chunks.len(), "document ingested");
        Ok(chunks.len())
    }

    /// Delete every chunk of `source`. Returns the number removed.
    ///
    /// A restricted tenant cannot lose its last listed source: an empty list
    /// would widen its scope to every document it owns.
    pub async fn remove_source(&self, tenant_id: i64, source: &str) -> Result<u64, DomainError> {
        let mut profile = self.tenants.get_profile(tenant_id).await?;
        if let Some(p) = &profile {
            if p.knowledge_sources.len() == 1 && p.knowledge_sources[0] == source {
                return Err(DomainError::InputInvalid(format!(
                    "'{}' is the only knowledge source of tenant {}; clear the source restriction first",
                    source, tenant_id
                )));
            }
        }

        let removed = self.store.delete_source(tenant_id, source).await?;
        if removed == 0 {
            warn!(tenant_id, source, "no chunks found for source");
        }
        if let Some(p) = profile.as_mut() {
            let before = p.knowledge_sources.len();
            p.knowledge_sources.retain(|s| s != source);
            if p.knowledge_sources.len() != before {
                self.tenants.upsert_profile(p).await?;
            }
        }
        info!(tenant_id, source, removed, "knowledge source removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::HashingEmbedder;
    use crate::domain::{KnowledgeScope, Language, TenantProfile};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        chunks: Mutex<Vec<KnowledgeChunk>>,
        replaces: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChunkStorePort for MemoryStore {
        async fn replace_chunks(
            &self,
            tenant_id: i64,
            source: &str,
            chunks: &[KnowledgeChunk],
        ) -> Result<(), DomainError> {
            self.replaces.fetch_add(1, Ordering::SeqCst);
            let mut all = self.chunks.lock().unwrap();
            all.retain(|c| !(c.tenant_id == tenant_id && c.source == source));
            all.extend_from_slice(chunks);
            Ok(())
        }

        async fn load_chunks(
            &self,
            scope: &KnowledgeScope,
        ) -> Result<Vec<KnowledgeChunk>, DomainError> {
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.tenant_id == scope.tenant_id)
                .cloned()
                .collect())
        }

        async fn delete_source(&self, tenant_id: i64, source: &str) -> Result<u64, DomainError> {
            let mut all = self.chunks.lock().unwrap();
            let before = all.len();
            all.retain(|c| !(c.tenant_id == tenant_id && c.source == source));
            Ok((before - all.len()) as u64)
        }
    }

    struct MemoryTenants {
        profile: Mutex<TenantProfile>,
    }

    #[async_trait::async_trait]
    impl TenantPort for MemoryTenants {
        async fn get_profile(&self, tenant_id: i64) -> Result<Option<TenantProfile>, DomainError> {
            let p = self.profile.lock().unwrap().clone();
            Ok((p.tenant_id == tenant_id).then_some(p))
        }

        async fn find_by_phone_id(
            &self,
            _phone_id: &str,
        ) -> Result<Option<TenantProfile>, DomainError> {
            Ok(None)
        }

        async fn upsert_profile(&self, profile: &TenantProfile) -> Result<i64, DomainError> {
            *self.profile.lock().unwrap() = profile.clone();
            Ok(profile.tenant_id)
        }

        async fn list_profiles(&self) -> Result<Vec<TenantProfile>, DomainError> {
            Ok(vec![self.profile.lock().unwrap().clone()])
        }
    }

    struct ShortEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingPort for ShortEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
            Ok(vec![vec![1.0]])
        }
    }

    fn tenants(sources: &[&str]) -> Arc<MemoryTenants> {
        Arc::new(MemoryTenants {
            profile: Mutex::new(TenantProfile {
                tenant_id: 1,
                name: "Lanka Bakes".into(),
                description: String::new(),
                persona: "Friendly".into(),
                supported_languages: vec![Language::En],
                default_language: Language::En,
                knowledge_sources: sources.iter().map(|s| s.to_string()).collect(),
                whatsapp_phone_id: None,
            }),
        })
    }

    fn service(store: Arc<MemoryStore>, tenants: Arc<MemoryTenants>) -> KnowledgeService {
        KnowledgeService::new(store, Arc::new(HashingEmbedder::default()), tenants)
    }

    #[tokio::test]
    async fn test_ingest_splits_embeds_and_stores() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), tenants(&[]))
            .with_splitter(TextSplitter::new(50, 10));
        let text = "Chocolate cake costs 2500 rupees.\n\nButter cake costs 1800 rupees.\n\nWe deliver in Kandy.";
        let n = svc.ingest_document(1, "menu", text).await.unwrap();
        assert!(n >= 2);
        let chunks = store.chunks.lock().unwrap().clone();
        assert_eq!(chunks.len(), n);
        assert!(chunks.iter().all(|c| c.embedding.len() == HashingEmbedder::DEFAULT_DIMS));
        assert_eq!(chunks[0].seq, 0);
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_chunks() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), tenants(&[]));
        svc.ingest_document(1, "menu", "Old menu with old prices").await.unwrap();
        svc.ingest_document(1, "menu", "New menu with new prices").await.unwrap();
        let chunks = store.chunks.lock().unwrap().clone();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("New"));
    }

    #[tokio::test]
    async fn test_rejects_short_or_empty_documents() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), tenants(&[]));
        for text in ["", "   ", "too short"] {
            assert!(matches!(
                svc.ingest_document(1, "menu", text).await,
                Err(DomainError::InputInvalid(_))
            ));
        }
        assert_eq!(store.replaces.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tenant() {
        let svc = service(Arc::new(MemoryStore::default()), tenants(&[]));
        assert!(matches!(
            svc.ingest_document(9, "menu", "A perfectly fine document").await,
            Err(DomainError::TenantNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch_stores_nothing() {
        let store = Arc::new(MemoryStore::default());
        let svc = KnowledgeService::new(store.clone(), Arc::new(ShortEmbedder), tenants(&[]))
            .with_splitter(TextSplitter::new(20, 0));
        let result = svc
            .ingest_document(1, "menu", "first paragraph here\n\nsecond paragraph here")
            .await;
        assert!(matches!(result, Err(DomainError::Embedding(_))));
        assert_eq!(store.replaces.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restricted_sources_track_ingest_and_removal() {
        let store = Arc::new(MemoryStore::default());
        let t = tenants(&["faq"]);
        let svc = service(store.clone(), t.clone());

        svc.ingest_document(1, "menu", "Chocolate cake 2500").await.unwrap();
        assert_eq!(
            t.profile.lock().unwrap().knowledge_sources,
            vec!["faq".to_string(), "menu".to_string()]
        );

        assert_eq!(svc.remove_source(1, "menu").await.unwrap(), 1);
        assert_eq!(t.profile.lock().unwrap().knowledge_sources, vec!["faq".to_string()]);
        assert!(store.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_restricted_source_cannot_be_removed() {
        let store = Arc::new(MemoryStore::default());
        let t = tenants(&[]);
        let svc = service(store.clone(), t.clone());
        svc.ingest_document(1, "menu", "Chocolate cake 2500").await.unwrap();
        svc.ingest_document(1, "internal_notes", "Supplier margin is 40%").await.unwrap();
        t.profile.lock().unwrap().knowledge_sources = vec!["menu".to_string()];

        assert!(matches!(
            svc.remove_source(1, "menu").await,
            Err(DomainError::InputInvalid(_))
        ));
        assert_eq!(t.profile.lock().unwrap().knowledge_sources, vec!["menu".to_string()]);
        let chunks = store.chunks.lock().unwrap().clone();
        assert!(chunks.iter().any(|c| c.source == "menu"));
        assert!(chunks.iter().any(|c| c.source == "internal_notes"));
    }

    #[tokio::test]
    async fn test_unrestricted_tenant_can_remove_any_source() {
        let store = Arc::new(MemoryStore::default());
        let t = tenants(&[]);
        let svc = service(store.clone(), t.clone());
        svc.ingest_document(1, "menu", "Chocolate cake 2500").await.unwrap();
        assert_eq!(svc.remove_source(1, "menu").await.unwrap(), 1);
        assert!(t.profile.lock().unwrap().knowledge_sources.is_empty());
    }
}
