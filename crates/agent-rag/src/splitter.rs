//! Text splitting
//!
//! Fixed-size character windows with overlap. A full window is shortened to
//! end at the last whitespace in its second half, so chunks rarely cut a word
//! in two. Output depends only on the document and the configuration.

use agent_core::error::{AgentError, Result};
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document};

/// Default maximum chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default characters shared by consecutive chunks
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl SplitterConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AgentError::Config("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(AgentError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Splitter {
    config: SplitterConfig,
}

impl Splitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split a document into chunks; blank windows are dropped
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let total = chars.len();
        let SplitterConfig { chunk_size, overlap } = self.config;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < total {
            let mut end = (start + chunk_size).min(total);
            if end < total {
                // Back off to whitespace in the second half of the window
                let floor = start + chunk_size / 2 + 1;
                if let Some(ws) = (floor..=end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws;
                }
            }

            let text: String = chars[start..end].iter().collect();
            if !text.trim().is_empty() {
                chunks.push(Chunk {
                    document_id: document.id.clone(),
                    source: document.source.clone(),
                    text,
                    start,
                    end,
                    index: chunks.len(),
                });
            }

            if end >= total {
                break;
            }
            start = end.saturating_sub(overlap).max(start + 1);
        }

        tracing::trace!(document = %document.id, chunks = chunks.len(), "Split document");
        chunks
    }
}
