//! HTTP Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use agent_core::{
    AgentError, ErrorKind, Message, RunOutcome, ToolSchema, reasoning::DEFAULT_RETRIEVAL_TOP_K,
};
use agent_rag::{Document, IngestReport, ScoredChunk};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub backend_connected: bool,
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Message suitable for end users
    pub error: String,
    /// Full error text
    pub detail: String,
    pub code: ErrorKind,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::InvalidRequest(_) | AgentError::InvalidArguments(_) | AgentError::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        AgentError::UnknownTool(_) => StatusCode::NOT_FOUND,
        AgentError::BackendUnavailable(_) | AgentError::Embedding(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AgentError::Authentication(_) | AgentError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        AgentError::InconsistentMetric { .. } | AgentError::DimensionMismatch { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: &AgentError) -> ApiError {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::warn!(error = %err, "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            detail: err.to_string(),
            code: err.kind(),
        }),
    )
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(api_error(&AgentError::InvalidRequest(format!("{field} must not be empty"))));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let adapter = state.orchestrator.adapter();
    let backend_connected = adapter.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: adapter.identity().to_string(),
        backend_connected,
        documents: state.store().document_ids().len(),
        chunks: state.store().len(),
    })
}

/// Run the agent on one message.
///
/// Runs that stop on a backend failure or the turn limit are still answered
/// with 200; the outcome carries the reason and the partial transcript.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<RunOutcome>, ApiError> {
    require_text("message", &payload.message)?;
    let outcome = state.orchestrator.run(&payload.message, payload.history).await;
    Ok(Json(outcome))
}

/// Ingest or re-ingest one document
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(payload): Json<DocumentRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    require_text("text", &payload.text)?;
    let id = payload
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let document = Document::new(id, payload.text, payload.source);
    let report = state.pipeline.ingest(&document).await.map_err(|e| api_error(&e))?;
    Ok(Json(report))
}

/// Top-k chunks for a query, best first
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<ScoredChunk>>, ApiError> {
    require_text("query", &payload.query)?;
    let k = payload.k.unwrap_or(DEFAULT_RETRIEVAL_TOP_K);
    let hits = state.store().query(&payload.query, k).await.map_err(|e| api_error(&e))?;
    Ok(Json(hits))
}

/// Schemas of the tools the agent may call
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.orchestrator.tools().schemas())
}
