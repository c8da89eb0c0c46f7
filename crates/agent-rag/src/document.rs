//! Documents, chunks and embeddings

use std::fmt;
use std::path::Path;

use agent_core::error::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// A source document; immutable once ingested
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    /// Where the text came from (path, URL, or a free-form label)
    pub source: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
        }
    }

    /// Read a UTF-8 file; the id is the file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AgentError::Config(format!("'{}' has no file name", path.display())))?;
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(id, text, path.display().to_string()))
    }
}

/// Stable identifier of a chunk: `<document id>#<chunk index>`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(document_id: &str, index: usize) -> Self {
        Self(format!("{document_id}#{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded span of a document; the unit of retrieval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub source: String,
    pub text: String,
    /// Char offset of the first character
    pub start: usize,
    /// Char offset one past the last character
    pub end: usize,
    /// Position within the document, contiguous from 0
    pub index: usize,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        ChunkId::new(&self.document_id, self.index)
    }
}

/// Vector for one chunk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub const fn new(chunk_id: ChunkId, vector: Vec<f32>) -> Self {
        Self { chunk_id, vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}
