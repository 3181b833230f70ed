//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; adapters without credentials fall back to local/mock variants.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wa_reply_agent::adapters::ai::{
    HashingEmbedder, LlmTranslator, MockLlmAdapter, MyMemoryTranslator, OpenAiAdapter,
    OpenAiEmbeddings,
};
use wa_reply_agent::adapters::persistence::{KnowledgeBase, SqliteRepo};
use wa_reply_agent::adapters::search::{DisabledWebSearch, SerpApiSearch};
use wa_reply_agent::adapters::ui::tui::TuiInputPort;
use wa_reply_agent::adapters::whatsapp::{LogMessenger, WhatsAppClient};
use wa_reply_agent::ports::{
    ChunkStorePort, EmbeddingPort, InputPort, KnowledgePort, LlmPort, MessageStorePort,
    MessengerPort, TenantPort, TranslatorPort, WebSearchPort,
};
use wa_reply_agent::shared::config::AppConfig;
use wa_reply_agent::usecases::{KnowledgeService, ReplyOrchestrator, ReplyQueue, ReplyWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    wa_reply_agent::adapters::ui::init_ui();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "configuration could not be loaded, using defaults");
            AppConfig::default()
        }
    };
    let timeout = cfg.http_timeout();

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let tenants: Arc<dyn TenantPort> = Arc::clone(&sqlite_repo) as Arc<dyn TenantPort>;
    let messages: Arc<dyn MessageStorePort> =
        Arc::clone(&sqlite_repo) as Arc<dyn MessageStorePort>;
    let chunks: Arc<dyn ChunkStorePort> = Arc::clone(&sqlite_repo) as Arc<dyn ChunkStorePort>;

    // --- Language model ---
    let llm: Arc<dyn LlmPort> = match cfg.llm_api_key() {
        Some(key) => {
            info!(
                model = %cfg.llm_model_or_default(),
                url = %cfg.llm_api_url_or_default(),
                "language model: OpenAI-compatible API"
            );
            Arc::new(
                OpenAiAdapter::new(
                    cfg.llm_api_url_or_default(),
                    key,
                    cfg.llm_model_or_default(),
                    timeout,
                )
                .map_err(|e| anyhow::anyhow!("{}", e))?,
            )
        }
        None => {
            warn!("WA_AGENT_LLM_API_KEY not set, using mock language model");
            Arc::new(MockLlmAdapter::new())
        }
    };

    // --- Embeddings & vector store ---
    let embedder: Arc<dyn EmbeddingPort> = match cfg.embeddings_api_key() {
        Some(key) => {
            info!(model = %cfg.embeddings_model_or_default(), "embeddings: OpenAI-compatible API");
            Arc::new(
                OpenAiEmbeddings::new(
                    cfg.embeddings_api_url_or_default(),
                    key,
                    cfg.embeddings_model_or_default(),
                    timeout,
                )
                .map_err(|e| anyhow::anyhow!("{}", e))?,
            )
        }
        None => {
            warn!(
                dims = cfg.embedding_dims_or_default(),
                "no embeddings API key, using local hashing embedder"
            );
            Arc::new(HashingEmbedder::new(cfg.embedding_dims_or_default()))
        }
    };
    let knowledge: Arc<dyn KnowledgePort> = Arc::new(KnowledgeBase::new(
        Arc::clone(&chunks),
        Arc::clone(&embedder),
    ));

    // --- Web search ---
    let web: Arc<dyn WebSearchPort> = match cfg.serpapi_key() {
        Some(key) => Arc::new(
            SerpApiSearch::new(
                key,
                cfg.search_country_or_default(),
                cfg.search_language_or_default(),
                timeout,
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        ),
        None => {
            warn!("WA_AGENT_SERPAPI_KEY not set, web search disabled");
            Arc::new(DisabledWebSearch)
        }
    };

    // --- Translation ---
    let translator: Arc<dyn TranslatorPort> = if cfg.use_mymemory_translator() {
        info!("translator: MyMemory API");
        Arc::new(
            MyMemoryTranslator::new(cfg.translator_email(), timeout)
                .map_err(|e| anyhow::anyhow!("{}", e))?,
        )
    } else {
        Arc::new(LlmTranslator::new(Arc::clone(&llm)))
    };

    // --- Messenger ---
    let messenger: Arc<dyn MessengerPort> = match cfg.whatsapp_token() {
        Some(token) => {
            let mut client = WhatsAppClient::new(token, cfg.whatsapp_phone_id(), timeout)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            if let Some(url) = cfg.whatsapp_graph_url() {
                client = client.with_graph_url(url);
            }
            Arc::new(client)
        }
        None => {
            warn!("WA_AGENT_WHATSAPP_TOKEN not set, replies are logged instead of sent");
            Arc::new(LogMessenger)
        }
    };

    // --- Services ---
    let policy = cfg.reply_policy();
    info!(
        top_k = policy.top_k,
        min_relevance = policy.min_relevance,
        min_results = policy.min_results,
        "reply policy loaded"
    );
    let orchestrator = Arc::new(ReplyOrchestrator::new(
        Arc::clone(&llm),
        knowledge,
        web,
        translator,
        policy,
    ));
    let knowledge_service = Arc::new(
        KnowledgeService::new(chunks, embedder, Arc::clone(&tenants))
            .with_splitter(cfg.splitter()),
    );

    // --- Reply pipeline: bounded channel for backpressure (producer blocks when full) ---
    let queue_size = cfg.reply_queue_size_or_default();
    let (reply_tx, reply_rx) = mpsc::channel(queue_size);
    let worker = ReplyWorker::new(
        Arc::clone(&orchestrator),
        Arc::clone(&tenants),
        Arc::clone(&messages),
        messenger,
        reply_rx,
    )
    .with_retry(cfg.retry_policy())
    .with_max_concurrent(cfg.worker_concurrency_or_default());
    info!(
        queue_size,
        concurrency = cfg.worker_concurrency_or_default(),
        "reply worker started"
    );
    let worker_handle = tokio::spawn(worker.run());
    let queue = ReplyQueue::new(reply_tx, Arc::clone(&tenants), Arc::clone(&messages));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        tenants,
        messages,
        orchestrator,
        knowledge_service,
        queue,
        data_path.join("exports"),
    ));

    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    // Dropping the last queue handle closes the channel; wait for in-flight replies.
    drop(input_port);
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "reply worker task ended abnormally");
    }
    info!("bye");
    Ok(())
}
