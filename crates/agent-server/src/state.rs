//! Application State

use std::sync::Arc;

use agent_core::Orchestrator;
use agent_rag::{IngestionPipeline, RetrievalStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Agent answering chat requests
    pub orchestrator: Arc<Orchestrator>,

    /// Ingestion into the same store the agent retrieves from
    pub pipeline: Arc<IngestionPipeline>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, pipeline: Arc<IngestionPipeline>) -> Self {
        Self { orchestrator, pipeline }
    }

    pub fn store(&self) -> &Arc<RetrievalStore> {
        self.pipeline.store()
    }
}
