//! SQLite-backed repository via libsql. Implements TenantPort, MessageStorePort and ChunkStorePort.
//!
//! All tenants share one database file: data/agent.db
//! Embeddings are stored as JSON arrays next to their chunk text.

use crate::domain::{
    DomainError, InboundMessage, KnowledgeChunk, KnowledgeScope, Language, MessageStatus,
    ReplyOutcome, StoredMessage, TenantProfile,
};
use crate::ports::{ChunkStorePort, MessageStorePort, TenantPort};
use chrono::Utc;
use libsql::{Connection, Database, Row, params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TENANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    persona TEXT NOT NULL,
    supported_languages TEXT NOT NULL DEFAULT '[]',
    default_language TEXT NOT NULL DEFAULT 'en',
    knowledge_sources TEXT NOT NULL DEFAULT '[]',
    whatsapp_phone_id TEXT,
    updated_at INTEGER NOT NULL
)"#;
const TENANTS_PHONE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_tenants_phone ON tenants (whatsapp_phone_id)";

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    provider_message_id TEXT,
    sender TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    received_at INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'received',
    draft TEXT,
    reply TEXT,
    language TEXT,
    target_language TEXT,
    intent TEXT,
    confidence INTEGER,
    processing_ms INTEGER,
    used_web_search INTEGER,
    translated INTEGER,
    degradations TEXT,
    error TEXT,
    updated_at INTEGER NOT NULL
)"#;
const MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_tenant_date ON messages (tenant_id, received_at DESC)";

const CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS knowledge_chunks (
    tenant_id INTEGER NOT NULL,
    source TEXT NOT NULL,
    seq INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding TEXT NOT NULL,
    PRIMARY KEY (tenant_id, source, seq)
)"#;

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// SQLite repository. One database file (agent.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join("agent.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row; consume it (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        for ddl in [
            TENANTS_TABLE,
            TENANTS_PHONE_INDEX,
            MESSAGES_TABLE,
            MESSAGES_INDEX,
            CHUNKS_TABLE,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(repo_err)
    }

    fn languages_to_json(langs: &[Language]) -> String {
        serde_json::to_string(langs).unwrap_or_else(|_| "[]".to_string())
    }

    fn row_to_profile(row: &Row) -> Result<TenantProfile, DomainError> {
        let supported: String = row.get(4).map_err(repo_err)?;
        let default: String = row.get(5).map_err(repo_err)?;
        let sources: String = row.get(6).map_err(repo_err)?;
        Ok(TenantProfile {
            tenant_id: row.get(0).map_err(repo_err)?,
            name: row.get(1).map_err(repo_err)?,
            description: row.get::<String>(2).unwrap_or_default(),
            persona: row.get(3).map_err(repo_err)?,
            supported_languages: serde_json::from_str(&supported)
                .map_err(|e| repo_err(format!("supported_languages: {}", e)))?,
            default_language: Language::from_code(&default)
                .ok_or_else(|| repo_err(format!("unknown default_language '{}'", default)))?,
            knowledge_sources: serde_json::from_str(&sources)
                .map_err(|e| repo_err(format!("knowledge_sources: {}", e)))?,
            whatsapp_phone_id: row.get(7).ok(),
        })
    }

    async fn query_profiles(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<TenantProfile>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn.query(sql, params).await.map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(Self::row_to_profile(&row)?);
        }
        Ok(out)
    }
}

const PROFILE_COLUMNS: &str = "id, name, description, persona, supported_languages, \
     default_language, knowledge_sources, whatsapp_phone_id";

#[async_trait::async_trait]
impl TenantPort for SqliteRepo {
    async fn get_profile(&self, tenant_id: i64) -> Result<Option<TenantProfile>, DomainError> {
        let sql = format!("SELECT {} FROM tenants WHERE id = ?1", PROFILE_COLUMNS);
        Ok(self
            .query_profiles(&sql, params![tenant_id])
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_phone_id(
        &self,
        phone_id: &str,
    ) -> Result<Option<TenantProfile>, DomainError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE whatsapp_phone_id = ?1 ORDER BY id LIMIT 1",
            PROFILE_COLUMNS
        );
        Ok(self
            .query_profiles(&sql, params![phone_id])
            .await?
            .into_iter()
            .next())
    }

    async fn upsert_profile(&self, profile: &TenantProfile) -> Result<i64, DomainError> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let supported = Self::languages_to_json(&profile.supported_languages);
        let sources =
            serde_json::to_string(&profile.knowledge_sources).unwrap_or_else(|_| "[]".to_string());

        if profile.tenant_id > 0 {
            let changed = conn
                .execute(
                    r#"
                    UPDATE tenants SET name = ?2, description = ?3, persona = ?4,
                        supported_languages = ?5, default_language = ?6,
                        knowledge_sources = ?7, whatsapp_phone_id = ?8, updated_at = ?9
                    WHERE id = ?1
                    "#,
                    params![
                        profile.tenant_id,
                        profile.name.as_str(),
                        profile.description.as_str(),
                        profile.persona.as_str(),
                        supported.as_str(),
                        profile.default_language.code(),
                        sources.as_str(),
                        profile.whatsapp_phone_id.clone(),
                        now
                    ],
                )
                .await
                .map_err(repo_err)?;
            if changed == 0 {
                return Err(DomainError::TenantNotFound(profile.tenant_id.to_string()));
            }
            return Ok(profile.tenant_id);
        }

        conn.execute(
            r#"
            INSERT INTO tenants (name, description, persona, supported_languages,
                default_language, knowledge_sources, whatsapp_phone_id, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                profile.name.as_str(),
                profile.description.as_str(),
                profile.persona.as_str(),
                supported.as_str(),
                profile.default_language.code(),
                sources.as_str(),
                profile.whatsapp_phone_id.clone(),
                now
            ],
        )
        .await
        .map_err(repo_err)?;
        let id = conn.last_insert_rowid();
        info!(tenant_id = id, name = %profile.name, "tenant created");
        Ok(id)
    }

    async fn list_profiles(&self) -> Result<Vec<TenantProfile>, DomainError> {
        let sql = format!("SELECT {} FROM tenants ORDER BY id", PROFILE_COLUMNS);
        self.query_profiles(&sql, ()).await
    }
}

#[async_trait::async_trait]
impl MessageStorePort for SqliteRepo {
    async fn record_inbound(&self, message: &InboundMessage) -> Result<i64, DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO messages (tenant_id, provider_message_id, sender, text, received_at, status, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'received', ?6)
            "#,
            params![
                message.tenant_id,
                message.provider_message_id.clone(),
                message.sender.as_str(),
                message.text.as_str(),
                message.received_at.timestamp(),
                Utc::now().timestamp()
            ],
        )
        .await
        .map_err(repo_err)?;
        let id = conn.last_insert_rowid();
        debug!(message_id = id, tenant_id = message.tenant_id, "inbound message recorded");
        Ok(id)
    }

    async fn mark_processing(&self, message_id: i64) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE messages SET status = 'processing', updated_at = ?2 WHERE id = ?1",
            params![message_id, Utc::now().timestamp()],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }

    async fn save_outcome(
        &self,
        message_id: i64,
        outcome: &ReplyOutcome,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let degradations =
            serde_json::to_string(&outcome.degradations).unwrap_or_else(|_| "[]".to_string());
        let changed = conn
            .execute(
                r#"
                UPDATE messages SET status = 'responded', draft = ?2, reply = ?3, language = ?4,
                    target_language = ?5, intent = ?6, confidence = ?7, processing_ms = ?8,
                    used_web_search = ?9, translated = ?10, degradations = ?11, error = NULL,
                    updated_at = ?12
                WHERE id = ?1
                "#,
                params![
                    message_id,
                    outcome.draft.as_str(),
                    outcome.text.as_str(),
                    outcome.detected_language.code(),
                    outcome.target_language.code(),
                    outcome.intent.label(),
                    i64::from(outcome.confidence),
                    outcome.elapsed_ms as i64,
                    i64::from(outcome.used_web_search),
                    i64::from(outcome.translated),
                    degradations.as_str(),
                    Utc::now().timestamp()
                ],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Err(DomainError::Repo(format!("message {} not found", message_id)));
        }
        Ok(())
    }

    async fn mark_failed(&self, message_id: i64, reason: &str) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE messages SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1",
            params![message_id, reason, Utc::now().timestamp()],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        tenant_id: i64,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, tenant_id, sender, text, received_at, status, reply, language,
                       confidence, processing_ms, error
                FROM messages
                WHERE tenant_id = ?1
                ORDER BY received_at DESC, id DESC
                LIMIT ?2
                "#,
                params![tenant_id, i64::from(limit)],
            )
            .await
            .map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let status: String = row.get(5).map_err(repo_err)?;
            out.push(StoredMessage {
                id: row.get(0).map_err(repo_err)?,
                tenant_id: row.get(1).map_err(repo_err)?,
                sender: row.get(2).map_err(repo_err)?,
                text: row.get::<String>(3).unwrap_or_default(),
                received_at: row.get(4).map_err(repo_err)?,
                status: MessageStatus::parse(&status),
                reply: row.get(6).ok(),
                language: row.get(7).ok(),
                confidence: row
                    .get::<i64>(8)
                    .ok()
                    .map(|c| c.clamp(0, 100) as u8),
                processing_ms: row.get::<i64>(9).ok().map(|ms| ms.max(0) as u64),
                error: row.get(10).ok(),
            });
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ChunkStorePort for SqliteRepo {
    async fn replace_chunks(
        &self,
        tenant_id: i64,
        source: &str,
        chunks: &[KnowledgeChunk],
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute(
            "DELETE FROM knowledge_chunks WHERE tenant_id = ?1 AND source = ?2",
            params![tenant_id, source],
        )
        .await
        .map_err(repo_err)?;
        for c in chunks {
            let embedding = serde_json::to_string(&c.embedding).map_err(repo_err)?;
            tx.execute(
                r#"
                INSERT INTO knowledge_chunks (tenant_id, source, seq, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    tenant_id,
                    source,
                    i64::from(c.seq),
                    c.text.as_str(),
                    embedding.as_str()
                ],
            )
            .await
            .map_err(repo_err)?;
        }
        tx.commit().await.map_err(repo_err)?;
        info!(tenant_id, source, chunks = chunks.len(), "knowledge chunks stored");
        Ok(())
    }

    async fn load_chunks(
        &self,
        scope: &KnowledgeScope,
    ) -> Result<Vec<KnowledgeChunk>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT tenant_id, source, seq, text, embedding
                FROM knowledge_chunks
                WHERE tenant_id = ?1
                ORDER BY source, seq
                "#,
                params![scope.tenant_id],
            )
            .await
            .map_err(repo_err)?;
        let wanted: HashSet<&str> = scope.sources.iter().map(String::as_str).collect();
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let source: String = row.get(1).map_err(repo_err)?;
            if !wanted.is_empty() && !wanted.contains(source.as_str()) {
                continue;
            }
            let embedding: String = row.get(4).map_err(repo_err)?;
            out.push(KnowledgeChunk {
                tenant_id: row.get(0).map_err(repo_err)?,
                source,
                seq: row.get::<i64>(2).map_err(repo_err)?.max(0) as u32,
                text: row.get(3).map_err(repo_err)?,
                embedding: serde_json::from_str(&embedding).map_err(repo_err)?,
            });
        }
        Ok(out)
    }

    async fn delete_source(&self, tenant_id: i64, source: &str) -> Result<u64, DomainError> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM knowledge_chunks WHERE tenant_id = ?1 AND source = ?2",
                params![tenant_id, source],
            )
            .await
            .map_err(repo_err)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Degradation, Intent};

    fn profile(phone: Option<&str>) -> TenantProfile {
        TenantProfile {
            tenant_id: 0,
            name: "Lanka Bakes".into(),
            description: "Bakery".into(),
            persona: "Friendly".into(),
            supported_languages: vec![Language::En, Language::Si],
            default_language: Language::Si,
            knowledge_sources: vec!["menu".into()],
            whatsapp_phone_id: phone.map(String::from),
        }
    }

    fn outcome() -> ReplyOutcome {
        ReplyOutcome {
            text: "ස්තූතියි".into(),
            draft: "Thank you".into(),
            detected_language: Language::Si,
            target_language: Language::Si,
            intent: Intent::Greeting,
            confidence: 85,
            elapsed_ms: 1234,
            used_web_search: true,
            translated: true,
            degradations: vec![Degradation::WebSearchUnavailable("down".into())],
        }
    }

    #[tokio::test]
    async fn test_tenant_roundtrip_and_phone_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();

        let id = repo.upsert_profile(&profile(Some("1055"))).await.unwrap();
        assert!(id > 0);

        let loaded = repo.get_profile(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Lanka Bakes");
        assert_eq!(loaded.default_language, Language::Si);
        assert_eq!(loaded.supported_languages, vec![Language::En, Language::Si]);
        assert_eq!(loaded.knowledge_sources, vec!["menu".to_string()]);

        let by_phone = repo.find_by_phone_id("1055").await.unwrap().unwrap();
        assert_eq!(by_phone.tenant_id, id);
        assert!(repo.find_by_phone_id("9999").await.unwrap().is_none());

        let mut updated = loaded.clone();
        updated.persona = "Formal".into();
        repo.upsert_profile(&updated).await.unwrap();
        assert_eq!(repo.get_profile(id).await.unwrap().unwrap().persona, "Formal");
        assert_eq!(repo.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_source_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        let id = repo.upsert_profile(&profile(None)).await.unwrap();
        repo.conn()
            .unwrap()
            .execute(
                "UPDATE tenants SET knowledge_sources = ?1 WHERE id = ?2",
                params!["not json", id],
            )
            .await
            .unwrap();
        assert!(matches!(repo.get_profile(id).await, Err(DomainError::Repo(_))));
    }

    #[tokio::test]
    async fn test_update_missing_tenant_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        let mut p = profile(None);
        p.tenant_id = 77;
        assert!(matches!(
            repo.upsert_profile(&p).await,
            Err(DomainError::TenantNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_message_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();

        let m = InboundMessage::new(3, "94771234567", "ආයුබෝවන්");
        let id = repo.record_inbound(&m).await.unwrap();
        repo.mark_processing(id).await.unwrap();
        repo.save_outcome(id, &outcome()).await.unwrap();

        let failed_id = repo
            .record_inbound(&InboundMessage::new(3, "94770000000", "hello"))
            .await
            .unwrap();
        repo.mark_failed(failed_id, "generation failed").await.unwrap();

        let recent = repo.recent_messages(3, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        let responded = recent.iter().find(|r| r.id == id).unwrap();
        assert_eq!(responded.status, MessageStatus::Responded);
        assert_eq!(responded.reply.as_deref(), Some("ස්තූතියි"));
        assert_eq!(responded.confidence, Some(85));
        assert_eq!(responded.processing_ms, Some(1234));
        let failed = recent.iter().find(|r| r.id == failed_id).unwrap();
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("generation failed"));
        assert!(failed.reply.is_none());

        assert!(repo.recent_messages(4, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_outcome_for_unknown_message_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        assert!(repo.save_outcome(999, &outcome()).await.is_err());
    }

    #[tokio::test]
    async fn test_chunks_replace_scope_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        let chunk = |source: &str, seq: u32| KnowledgeChunk {
            tenant_id: 1,
            source: source.into(),
            seq,
            text: format!("{source} #{seq}"),
            embedding: vec![0.5, 0.25],
        };

        repo.replace_chunks(1, "menu", &[chunk("menu", 0), chunk("menu", 1)])
            .await
            .unwrap();
        repo.replace_chunks(1, "faq", &[chunk("faq", 0)]).await.unwrap();
        // replacing drops the old chunks of that source only
        repo.replace_chunks(1, "menu", &[chunk("menu", 0)]).await.unwrap();

        let all = repo
            .load_chunks(&KnowledgeScope { tenant_id: 1, sources: vec![] })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].embedding, vec![0.5, 0.25]);

        let faq_only = repo
            .load_chunks(&KnowledgeScope { tenant_id: 1, sources: vec!["faq".into()] })
            .await
            .unwrap();
        assert_eq!(faq_only.len(), 1);
        assert_eq!(faq_only[0].text, "faq #0");

        assert_eq!(repo.delete_source(1, "faq").await.unwrap(), 1);
        let other_tenant = repo
            .load_chunks(&KnowledgeScope { tenant_id: 2, sources: vec![] })
            .await
            .unwrap();
        assert!(other_tenant.is_empty());
    }
}
