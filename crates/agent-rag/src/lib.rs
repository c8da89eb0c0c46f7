//! # agent-rag
//!
//! Retrieval grounding for agent-core: documents are split into chunks,
//! embedded, and indexed in a [`RetrievalStore`] that the orchestrator
//! queries through the `Retriever` trait.
//!
//! ```text
//! Document ──► Splitter ──► Embedder ──► RetrievalStore ◄── Orchestrator
//!   (loader)     (chunks)    (vectors)     (snapshot)        (retrieve)
//! ```

pub mod document;
pub mod embedder;
pub mod ingest;
pub mod loader;
pub mod splitter;
pub mod store;

pub use document::{Chunk, ChunkId, Document, Embedding};
pub use embedder::HashingEmbedder;
pub use ingest::{IngestReport, IngestionPipeline, PipelineConfig};
pub use loader::load_dir;
pub use splitter::{Splitter, SplitterConfig};
pub use store::{Metric, RetrievalStore, ScoredChunk};
