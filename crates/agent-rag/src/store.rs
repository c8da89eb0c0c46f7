//! Retrieval Store
//!
//! In-memory vector index over embedded chunks. Readers clone an `Arc` to the
//! current snapshot and score without holding the lock; writers build a new
//! snapshot and swap it in, so a query never observes a half-ingested
//! document.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use agent_core::error::{AgentError, Result};
use agent_core::retrieval::{Embedder, Passage, Retriever};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Embedding};

const INDEX_FORMAT_VERSION: u32 = 1;

/// Similarity metric; higher scores are always better
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    InnerProduct,
    /// Negative Euclidean distance
    Euclidean,
}

impl Metric {
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot = dot(a, b);
                let norms = dot_self(a).sqrt() * dot_self(b).sqrt();
                if norms == 0.0 { 0.0 } else { dot / norms }
            }
            Self::InnerProduct => dot(a, b),
            Self::Euclidean => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::InnerProduct => "inner_product",
            Self::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "inner_product" | "dot" => Ok(Self::InnerProduct),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(AgentError::Config(format!("unknown metric '{other}'"))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}

/// A chunk with its query score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl From<ScoredChunk> for Passage {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            document_id: scored.chunk.document_id,
            source: scored.chunk.source,
            chunk_index: scored.chunk.index,
            text: scored.chunk.text,
            score: scored.score,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Immutable view of the index; entries are kept in insertion order
#[derive(Clone, Debug, Default)]
struct Snapshot {
    dimensions: Option<usize>,
    entries: Vec<Entry>,
}

impl Snapshot {
    fn check_dimensions(&self, found: usize) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != found => {
                Err(AgentError::DimensionMismatch { expected, found })
            }
            _ if found == 0 => Err(AgentError::Embedding("embedding vector is empty".into())),
            _ => Ok(()),
        }
    }

    fn push(&mut self, chunk: Chunk, embedding: Embedding) -> Result<()> {
        if embedding.chunk_id != chunk.id() {
            return Err(AgentError::Config(format!(
                "embedding for {} does not belong to chunk {}",
                embedding.chunk_id,
                chunk.id()
            )));
        }
        self.check_dimensions(embedding.dimensions())?;
        self.dimensions = Some(embedding.dimensions());
        self.entries.push(Entry {
            chunk,
            vector: embedding.vector,
        });
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    metric: Metric,
    embedding_model: String,
    #[serde(default)]
    dimensions: Option<usize>,
    entries: Vec<Entry>,
}

/// Vector index with a fixed metric and a fixed embedder
pub struct RetrievalStore {
    embedder: Arc<dyn Embedder>,
    metric: Metric,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl fmt::Debug for RetrievalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("RetrievalStore")
            .field("embedder", &self.embedder.model())
            .field("metric", &self.metric)
            .field("dimensions", &snapshot.dimensions)
            .field("entries", &snapshot.entries.len())
            .finish()
    }
}

impl RetrievalStore {
    pub fn new(embedder: Arc<dyn Embedder>, metric: Metric) -> Self {
        Self {
            embedder,
            metric,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Store with the default (cosine) metric
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self::new(embedder, Metric::default())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Build a new snapshot from the current one and swap it in
    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot) -> Result<()>,
    {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&guard);
        f(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    pub const fn metric(&self) -> Metric {
        self.metric
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.snapshot().dimensions
    }

    pub fn len(&self) -> usize {
        self.snapshot().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of indexed documents, in first-insertion order
    pub fn document_ids(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut ids: Vec<String> = Vec::new();
        for entry in &snapshot.entries {
            if !ids.contains(&entry.chunk.document_id) {
                ids.push(entry.chunk.document_id.clone());
            }
        }
        ids
    }

    /// Add one embedded chunk
    pub fn add(&self, chunk: Chunk, embedding: Embedding) -> Result<()> {
        self.update(|snapshot| snapshot.push(chunk, embedding))
    }

    /// Replace every entry of `document_id` in one swap
    pub fn replace_document(
        &self,
        document_id: &str,
        entries: Vec<(Chunk, Embedding)>,
    ) -> Result<()> {
        if let Some((chunk, _)) = entries.iter().find(|(c, _)| c.document_id != document_id) {
            return Err(AgentError::Config(format!(
                "chunk {} does not belong to document '{document_id}'",
                chunk.id()
            )));
        }

        self.update(|snapshot| {
            snapshot.entries.retain(|e| e.chunk.document_id != document_id);
            if snapshot.entries.is_empty() {
                snapshot.dimensions = None;
            }
            for (chunk, embedding) in entries {
                snapshot.push(chunk, embedding)?;
            }
            Ok(())
        })
    }

    /// Remove a document; returns the number of entries dropped
    pub fn remove_document(&self, document_id: &str) -> usize {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&guard);
        next.entries.retain(|e| e.chunk.document_id != document_id);
        let removed = guard.entries.len() - next.entries.len();
        if removed > 0 {
            if next.entries.is_empty() {
                next.dimensions = None;
            }
            *guard = Arc::new(next);
        }
        removed
    }

    /// Stored vectors of a document keyed by chunk text
    pub fn vectors_for(&self, document_id: &str) -> HashMap<String, Vec<f32>> {
        self.snapshot()
            .entries
            .iter()
            .filter(|e| e.chunk.document_id == document_id)
            .map(|e| (e.chunk.text.clone(), e.vector.clone()))
            .collect()
    }

    /// Nearest chunks to `text`, best first, at most `k`
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(text).await?;
        self.search(&vector, k)
    }

    /// Nearest chunks to a precomputed vector
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.snapshot();
        if k == 0 || snapshot.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = snapshot.dimensions {
            if expected != vector.len() {
                return Err(AgentError::DimensionMismatch {
                    expected,
                    found: vector.len(),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.metric.score(vector, &e.vector)))
            .collect();
        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: snapshot.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Merge another store's entries; its documents replace ours
    pub fn absorb(&self, other: &Self) -> Result<()> {
        if other.metric != self.metric {
            return Err(AgentError::InconsistentMetric {
                expected: self.metric.to_string(),
                found: other.metric.to_string(),
            });
        }
        let incoming = other.snapshot();
        let replaced: Vec<&str> =
            incoming.entries.iter().map(|e| e.chunk.document_id.as_str()).collect();

        self.update(|snapshot| {
            snapshot.entries.retain(|e| !replaced.contains(&e.chunk.document_id.as_str()));
            if snapshot.entries.is_empty() {
                snapshot.dimensions = None;
            }
            for entry in &incoming.entries {
                let embedding = Embedding::new(entry.chunk.id(), entry.vector.clone());
                snapshot.push(entry.chunk.clone(), embedding)?;
            }
            Ok(())
        })
    }

    /// Persist the index as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let index = PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            metric: self.metric,
            embedding_model: self.embedder.model().to_string(),
            dimensions: snapshot.dimensions,
            entries: snapshot.entries.clone(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&index)?)?;
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            entries = index.entries.len(),
            "Saved retrieval index"
        );
        Ok(())
    }

    /// Load a persisted index; the stored metric must equal `metric`
    pub fn load(
        path: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        metric: Metric,
    ) -> Result<Self> {
        let path = path.as_ref();
        let index: PersistedIndex = serde_json::from_slice(&std::fs::read(path)?)?;

        if index.version != INDEX_FORMAT_VERSION {
            return Err(AgentError::Config(format!(
                "unsupported index version {} in {}",
                index.version,
                path.display()
            )));
        }
        if index.metric != metric {
            return Err(AgentError::InconsistentMetric {
                expected: metric.to_string(),
                found: index.metric.to_string(),
            });
        }
        if index.embedding_model != embedder.model() {
            tracing::warn!(
                stored = %index.embedding_model,
                current = %embedder.model(),
                "Index was built with a different embedding model"
            );
        }

        let mut snapshot = Snapshot::default();
        for entry in index.entries {
            let embedding = Embedding::new(entry.chunk.id(), entry.vector);
            snapshot.push(entry.chunk, embedding)?;
        }
        if let (Some(declared), Some(actual)) = (index.dimensions, snapshot.dimensions) {
            if declared != actual {
                return Err(AgentError::DimensionMismatch {
                    expected: declared,
                    found: actual,
                });
            }
        }

        tracing::info!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            "Loaded retrieval index"
        );
        Ok(Self {
            embedder,
            metric,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }
}

#[async_trait]
impl Retriever for RetrievalStore {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        Ok(self.query(query, k).await?.into_iter().map(Passage::from).collect())
    }
}
