//! Ingestion Pipeline
//!
//! Document → chunks → embeddings → store. A chunk that fails to embed is
//! skipped and reported; the rest of the document is still indexed. Chunks
//! whose text is unchanged since the last ingestion reuse their stored
//! vector.

use std::path::Path;
use std::sync::Arc;

use agent_core::error::{AgentError, ErrorKind, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document, Embedding};
use crate::loader::load_dir;
use crate::splitter::{Splitter, SplitterConfig};
use crate::store::RetrievalStore;

/// Default concurrent embedding calls per document
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub splitter: SplitterConfig,
    pub embed_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }
}

/// A chunk that could not be indexed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub error: String,
}

/// Outcome of ingesting one document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    /// Chunks produced by the splitter, in document order
    pub chunks: Vec<Chunk>,
    /// Chunks embedded in this run
    pub inserted: usize,
    /// Chunks whose previous vector was reused
    pub reused: usize,
    pub failures: Vec<ChunkFailure>,
}

impl IngestReport {
    pub const fn indexed(&self) -> usize {
        self.inserted + self.reused
    }
}

enum Embedded {
    Fresh(Chunk, Vec<f32>),
    Reused(Chunk, Vec<f32>),
    Failed(usize, AgentError),
}

pub struct IngestionPipeline {
    splitter: Splitter,
    store: Arc<RetrievalStore>,
    concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(store: Arc<RetrievalStore>, config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            splitter: Splitter::new(config.splitter)?,
            store,
            concurrency: config.embed_concurrency.max(1),
        })
    }

    pub const fn store(&self) -> &Arc<RetrievalStore> {
        &self.store
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.splitter.split(document)
    }

    /// Index one document, replacing any previous version of it
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let chunks = self.split(document);
        let previous = self.store.vectors_for(&document.id);
        let embedder = Arc::clone(self.store.embedder());

        let results: Vec<Embedded> = stream::iter(chunks.iter().cloned())
            .map(|chunk| {
                let embedder = Arc::clone(&embedder);
                let cached = previous.get(&chunk.text).cloned();
                async move {
                    if let Some(vector) = cached {
                        return Embedded::Reused(chunk, vector);
                    }
                    match embedder.embed(&chunk.text).await {
                        Ok(vector) => Embedded::Fresh(chunk, vector),
                        Err(e) => Embedded::Failed(chunk.index, e),
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = IngestReport {
            document_id: document.id.clone(),
            ..IngestReport::default()
        };
        let mut entries = Vec::with_capacity(chunks.len());
        for result in results {
            match result {
                Embedded::Fresh(chunk, vector) => {
                    report.inserted += 1;
                    let id = chunk.id();
                    entries.push((chunk, Embedding::new(id, vector)));
                }
                Embedded::Reused(chunk, vector) => {
                    report.reused += 1;
                    let id = chunk.id();
                    entries.push((chunk, Embedding::new(id, vector)));
                }
                Embedded::Failed(index, e) => {
                    tracing::warn!(
                        document = %document.id,
                        chunk = index,
                        error = %e,
                        "Chunk embedding failed"
                    );
                    report.failures.push(ChunkFailure {
                        index,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.store.replace_document(&document.id, entries)?;
        report.chunks = chunks;

        tracing::info!(
            document = %document.id,
            chunks = report.chunks.len(),
            inserted = report.inserted,
            reused = report.reused,
            failed = report.failures.len(),
            "Ingested document"
        );
        Ok(report)
    }

    /// Ingest several documents in order
    pub async fn ingest_all(&self, documents: &[Document]) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await?);
        }
        Ok(reports)
    }

    /// Load and ingest every matching file under `dir`
    pub async fn ingest_dir(
        &self,
        dir: impl AsRef<Path>,
        extensions: &[&str],
    ) -> Result<Vec<IngestReport>> {
        let documents = load_dir(dir, extensions)?;
        self.ingest_all(&documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::store::Metric;
    use agent_core::retrieval::Embedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hashing embedder that counts calls and rejects texts containing "poison"
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model(&self) -> &str {
            "counting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("poison") {
                return Err(AgentError::Embedding("refused".into()));
            }
            self.inner.embed_text(text)
        }
    }

    fn pipeline(
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        overlap: usize,
    ) -> IngestionPipeline {
        let store = Arc::new(RetrievalStore::new(embedder, Metric::Cosine));
        let config = PipelineConfig {
            splitter: SplitterConfig::new(chunk_size, overlap).unwrap(),
            ..PipelineConfig::default()
        };
        IngestionPipeline::new(store, config).unwrap()
    }

    fn counting() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(64),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let embedder = counting();
        let pipeline = pipeline(embedder.clone(), 40, 8);
        let text = "Rust is fast. Tokio drives async tasks. Axum serves HTTP. ".repeat(4);
        let doc = Document::new("notes", text, "notes.md");

        let first = pipeline.ingest(&doc).await.unwrap();
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);
        assert!(first.chunks.len() > 1);
        assert_eq!(first.chunks, pipeline.split(&doc));

        let second = pipeline.ingest(&doc).await.unwrap();
        assert_eq!(first.chunks, second.chunks);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.reused, first.indexed());
        assert_eq!(pipeline.store().len(), first.indexed());
        // Unchanged chunks are not embedded again
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn test_reingest_replaces_changed_chunks() {
        let pipeline = pipeline(counting(), 100, 10);
        pipeline
            .ingest(&Document::new("d", "The sky is blue.", "d.txt"))
            .await
            .unwrap();
        let report = pipeline
            .ingest(&Document::new("d", "The sky is grey today.", "d.txt"))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(pipeline.store().len(), 1);
        let hits = pipeline.store().query("grey", 1).await.unwrap();
        assert_eq!(hits[0].chunk.text, "The sky is grey today.");
    }

    #[tokio::test]
    async fn test_failed_chunks_are_reported_and_skipped() {
        let pipeline = pipeline(counting(), 20, 0);
        let doc = Document::new("mixed", "good text here and poison text here", "mixed.txt");
        let report = pipeline.ingest(&doc).await.unwrap();

        assert_eq!(report.chunks.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, ErrorKind::Embedding);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(pipeline.store().len(), report.chunks.len() - 1);
    }

    #[tokio::test]
    async fn test_sky_example() {
        let pipeline = pipeline(Arc::new(HashingEmbedder::default()), 64, 8);
        let reports = pipeline
            .ingest_all(&[
                Document::new("sky", "The sky is blue.", "sky.txt"),
                Document::new("grass", "Grass grows in spring.", "grass.txt"),
            ])
            .await
            .unwrap();
        assert_eq!(reports[0].chunks.len(), 1);
        assert_eq!(reports[0].chunks[0].text, "The sky is blue.");
        assert_eq!(reports[0].chunks[0].index, 0);

        let hits = pipeline.store().query("sky color", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_ingest_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "Alpha document.").unwrap();
        std::fs::write(dir.path().join("b.txt"), "Beta document.").unwrap();
        std::fs::write(dir.path().join("c.bin"), "ignored").unwrap();

        let pipeline = pipeline(Arc::new(HashingEmbedder::default()), 64, 8);
        let reports = pipeline.ingest_dir(dir.path(), &["md", "txt"]).await.unwrap();
        let ids: Vec<_> = reports.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_reingest_see_one_version() {
        let pipeline = Arc::new(pipeline(Arc::new(HashingEmbedder::default()), 40, 8));
        let old_text = "Old rivers bend slowly around ancient stone bridges. ".repeat(3);
        let new_text = "New towers rise quickly above busy glass avenues. ".repeat(3);
        let old = Document::new("guide", old_text, "guide.md");
        let new = Document::new("guide", new_text, "guide.md");

        let texts = |doc: &Document| -> Vec<String> {
            let mut texts: Vec<String> = pipeline.split(doc).into_iter().map(|c| c.text).collect();
            texts.sort();
            texts
        };
        let versions = [texts(&old), texts(&new)];
        assert!(versions[0].len() > 1 && versions[1].len() > 1);
        pipeline.ingest(&old).await.unwrap();

        let writer = {
            let pipeline = Arc::clone(&pipeline);
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                for round in 0..40 {
                    let doc = if round % 2 == 0 { &new } else { &old };
                    pipeline.ingest(doc).await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let versions = versions.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let hits = pipeline.store().query("rivers towers", 100).await.unwrap();
                        let mut seen: Vec<String> =
                            hits.into_iter().map(|h| h.chunk.text).collect();
                        seen.sort();
                        assert!(versions.contains(&seen), "mixed result set: {seen:?}");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
