//! grounded-agent HTTP Server
//!
//! Axum-based server exposing the orchestrator, document ingestion and
//! retrieval search over a REST API.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{CalculatorTool, ModelAdapter, Orchestrator, ToolRegistry, retrieval::Embedder};
use agent_rag::{HashingEmbedder, IngestionPipeline, RetrievalStore, loader::DEFAULT_EXTENSIONS};
use agent_runtime::{OllamaAdapter, OllamaEmbedder, RemoteApiAdapter};

use crate::config::{Backend, EmbedderKind, ServerConfig};
use crate::handlers::{chat_handler, health_check, ingest_document, list_tools, search};
use crate::state::AppState;

/// All routes, without the CORS and trace layers
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        // Agent API
        .route("/api/chat", post(chat_handler))
        // Retrieval
        .route("/api/documents", post(ingest_document))
        .route("/api/search", post(search))
        .with_state(state)
}

fn build_adapter(config: &ServerConfig) -> anyhow::Result<Arc<dyn ModelAdapter>> {
    let adapter_config = config.adapter();
    Ok(match config.backend {
        Backend::Ollama => Arc::new(OllamaAdapter::new(&config.ollama, &adapter_config)?),
        Backend::Remote => Arc::new(RemoteApiAdapter::new(adapter_config)?),
    })
}

fn build_embedder(config: &ServerConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(match config.embedder {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
        EmbedderKind::Ollama => {
            Arc::new(OllamaEmbedder::new(&config.ollama, &config.embed_adapter())?)
        }
    })
}

fn build_store(
    config: &ServerConfig,
    embedder: Arc<dyn Embedder>,
) -> anyhow::Result<RetrievalStore> {
    match &config.index_path {
        Some(path) if path.exists() => {
            let store = RetrievalStore::load(path, embedder, config.metric)?;
            tracing::info!(path = %path.display(), chunks = store.len(), "Loaded retrieval index");
            Ok(store)
        }
        _ => Ok(RetrievalStore::new(embedder, config.metric)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Model backend
    let adapter = build_adapter(&config)?;
    match adapter.health_check().await {
        Ok(true) => tracing::info!(backend = %adapter.identity(), "Connected to model backend"),
        Ok(false) | Err(_) => {
            tracing::warn!(
                backend = %adapter.identity(),
                "Model backend not reachable; chat requests will fail"
            );
        }
    }

    // Retrieval store and ingestion
    let store = Arc::new(build_store(&config, build_embedder(&config)?)?);
    let pipeline = Arc::new(IngestionPipeline::new(Arc::clone(&store), config.pipeline()?)?);

    if let Some(dir) = &config.docs_dir {
        let reports = pipeline.ingest_dir(dir, DEFAULT_EXTENSIONS).await?;
        let failed: usize = reports.iter().map(|r| r.failures.len()).sum();
        tracing::info!(
            dir = %dir.display(),
            documents = reports.len(),
            chunks = store.len(),
            failed,
            "Ingested document directory"
        );
        if let Some(path) = &config.index_path {
            store.save(path)?;
            tracing::info!(path = %path.display(), "Saved retrieval index");
        }
    }

    // Tools
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool)?;
    tracing::info!("Registered {} tools: {}", tools.len(), tools.names().join(", "));

    let orchestrator = Orchestrator::builder()
        .adapter(adapter)
        .tools(tools)
        .retriever(Arc::clone(&store) as Arc<dyn agent_core::Retriever>)
        .max_turns(config.max_turns)
        .build()?;

    let state = AppState::new(Arc::new(orchestrator), pipeline);

    // CORS configuration
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("grounded-agent server running on http://{}", config.bind_addr);
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/tools      - Tool schemas");
    tracing::info!("  POST /api/chat       - Run the agent");
    tracing::info!("  POST /api/documents  - Ingest a document");
    tracing::info!("  POST /api/search     - Search the index");

    axum::serve(listener, app).await?;

    Ok(())
}
