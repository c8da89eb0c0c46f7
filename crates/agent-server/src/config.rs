//! Server Configuration
//!
//! Everything the binary needs is read from the environment once, at
//! startup, and handed to the library constructors as plain values.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use agent_core::error::{AgentError, Result};
use agent_core::provider::AdapterConfig;
use agent_core::reasoning::DEFAULT_MAX_TURNS;
use agent_rag::ingest::PipelineConfig;
use agent_rag::splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitterConfig};
use agent_rag::store::Metric;
use agent_runtime::{DEFAULT_API_BASE, OllamaConfig};

/// Which model backend serves the agent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Ollama,
    Remote,
}

impl FromStr for Backend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "remote" | "openai" => Ok(Self::Remote),
            other => Err(AgentError::Config(format!("unknown AGENT_BACKEND '{other}'"))),
        }
    }
}

/// Which embedder backs the retrieval store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    Hashing,
    Ollama,
}

impl FromStr for EmbedderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            other => Err(AgentError::Config(format!("unknown EMBEDDER '{other}'"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub backend: Backend,
    pub model: String,
    pub ollama: OllamaConfig,
    pub remote_api_base: String,
    pub remote_api_key: Option<String>,
    pub max_turns: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_concurrency: usize,
    pub embedder: EmbedderKind,
    pub embed_model: String,
    pub metric: Metric,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub docs_dir: Option<PathBuf>,
    pub index_path: Option<PathBuf>,
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let adapter = AdapterConfig::default();
        Self {
            backend: Backend::Ollama,
            model: adapter.model,
            ollama: OllamaConfig::default(),
            remote_api_base: DEFAULT_API_BASE.into(),
            remote_api_key: None,
            max_turns: DEFAULT_MAX_TURNS,
            timeout: adapter.timeout,
            max_retries: adapter.max_retries,
            max_concurrency: adapter.max_concurrency,
            embedder: EmbedderKind::Hashing,
            embed_model: "nomic-embed-text".into(),
            metric: Metric::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            docs_dir: None,
            index_path: None,
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("AGENT_BACKEND") {
            config.backend = v.parse()?;
        }
        if let Some(v) = get("AGENT_MODEL") {
            config.model = v;
        }
        if let Some(v) = get("OLLAMA_HOST") {
            config.ollama.host = v;
        }
        if let Some(v) = get("OLLAMA_PORT") {
            config.ollama.port = parse("OLLAMA_PORT", &v)?;
        }
        if let Some(v) = get("REMOTE_API_BASE") {
            config.remote_api_base = v;
        }
        config.remote_api_key = get("REMOTE_API_KEY");
        if let Some(v) = get("AGENT_MAX_TURNS") {
            config.max_turns = parse("AGENT_MAX_TURNS", &v)?;
        }
        if let Some(v) = get("AGENT_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse("AGENT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("AGENT_MAX_RETRIES") {
            config.max_retries = parse("AGENT_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("AGENT_MAX_CONCURRENCY") {
            config.max_concurrency = parse("AGENT_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("EMBEDDER") {
            config.embedder = v.parse()?;
        }
        if let Some(v) = get("EMBED_MODEL") {
            config.embed_model = v;
        }
        if let Some(v) = get("RETRIEVAL_METRIC") {
            config.metric = v.parse()?;
        }
        if let Some(v) = get("CHUNK_SIZE") {
            config.chunk_size = parse("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            config.chunk_overlap = parse("CHUNK_OVERLAP", &v)?;
        }
        config.docs_dir = get("DOCS_DIR").map(PathBuf::from);
        config.index_path = get("INDEX_PATH").map(PathBuf::from);
        if let Some(v) = get("BIND_ADDR") {
            config.bind_addr = v;
        }

        if config.max_turns == 0 {
            return Err(AgentError::Config("AGENT_MAX_TURNS must be at least 1".into()));
        }
        config.pipeline()?;
        Ok(config)
    }

    /// Adapter settings for the chat model
    pub fn adapter(&self) -> AdapterConfig {
        let endpoint = match self.backend {
            Backend::Ollama => self.ollama.endpoint(),
            Backend::Remote => self.remote_api_base.clone(),
        };
        let config = AdapterConfig::new(&self.model, endpoint)
            .timeout(self.timeout)
            .max_retries(self.max_retries)
            .max_concurrency(self.max_concurrency);
        match &self.remote_api_key {
            Some(key) => config.credential(key),
            None => config,
        }
    }

    /// Adapter settings for the embedding model
    pub fn embed_adapter(&self) -> AdapterConfig {
        AdapterConfig::new(&self.embed_model, self.ollama.endpoint())
            .timeout(self.timeout)
            .max_retries(self.max_retries)
            .max_concurrency(self.max_concurrency)
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            splitter: SplitterConfig::new(self.chunk_size, self.chunk_overlap)?,
            ..PipelineConfig::default()
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::Config(format!("{key} has an invalid value '{value}'")))
}
