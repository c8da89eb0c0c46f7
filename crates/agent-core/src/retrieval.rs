//! Retrieval Contracts
//!
//! The orchestrator grounds answers through a [`Retriever`]; document stores
//! turn text into vectors through an [`Embedder`]. Implementations live in
//! `agent-rag` and `agent-runtime`.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Text-to-vector function
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the embedding model (recorded with persisted indexes)
    fn model(&self) -> &str;

    /// Embed one text; blank text fails with `Embedding`
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A retrieved chunk with its provenance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub document_id: String,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Nearest-neighbour lookup used for grounding
#[async_trait]
pub trait Retriever: Send + Sync {
    /// At most `k` passages, best first
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}

/// Concatenate passages, each annotated with its source
pub fn format_passages(query: &str, passages: &[Passage]) -> String {
    if passages.is_empty() {
        return format!("Observation: no passages found for \"{query}\".");
    }

    let mut out = format!("Observation: {} passage(s) for \"{query}\":\n", passages.len());
    for (rank, passage) in passages.iter().enumerate() {
        let _ = write!(
            out,
            "\n[{}] source: {} (chunk {}, score {:.3})\n{}\n",
            rank + 1,
            passage.source,
            passage.chunk_index,
            passage.score,
            passage.text.trim()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_passages_annotates_sources() {
        let passages = vec![Passage {
            document_id: "sky".into(),
            source: "docs/sky.txt".into(),
            chunk_index: 0,
            text: "The sky is blue.".into(),
            score: 0.91,
        }];
        let text = format_passages("sky color", &passages);
        assert!(text.contains("source: docs/sky.txt (chunk 0, score 0.910)"));
        assert!(text.contains("The sky is blue."));
    }

    #[test]
    fn test_format_empty_passages() {
        assert!(format_passages("nothing", &[]).contains("no passages found"));
    }
}
