//! Model Adapter Strategy Pattern
//!
//! Defines a common interface for all text-generation backends (local hosted
//! models, remote API models) so the orchestrator works with any backend
//! without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{AdapterConfig, ModelAdapter, StepRequest};
//!
//! // Bind an adapter to one backend at construction
//! let adapter = RemoteApiAdapter::new(config)?;
//!
//! // Use through the trait
//! let step = adapter.generate(&StepRequest::new(&instructions, &messages, &tools)).await?;
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::step::{ModelStep, parse_step};
use crate::tool::ToolSchema;

/// Sampling options passed to the backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

const fn default_temperature() -> f32 {
    0.2
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Secret credential; never printed
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Construction-time configuration for one backend binding
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    /// Model identifier (e.g., "llama3.2", "gpt-4o-mini")
    pub model: String,

    /// Base URL of the backend
    pub endpoint: String,

    /// API credential (required by remote backends)
    pub credential: Option<Credential>,

    /// Per-attempt request timeout
    pub timeout: Duration,

    /// Retries after a `BackendUnavailable` failure
    pub max_retries: u32,

    /// Initial backoff; doubles per retry
    pub retry_backoff: Duration,

    /// Concurrent in-flight calls allowed per adapter
    pub max_concurrency: usize,

    /// Sampling options
    pub generation: GenerationOptions,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            endpoint: "http://localhost:11434".into(),
            credential: None,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            max_concurrency: 4,
            generation: GenerationOptions::default(),
        }
    }
}

impl AdapterConfig {
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(credential));
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub const fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Credential that is present and non-blank
    pub fn require_credential(&self) -> Result<&Credential> {
        self.credential
            .as_ref()
            .filter(|c| !c.is_blank())
            .ok_or_else(|| AgentError::Authentication("credential is missing or empty".into()))
    }
}

/// Which backend an adapter is bound to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendIdentity {
    /// Adapter family (e.g., "ollama", "remote-api")
    pub kind: String,
    pub model: String,
    pub endpoint: String,
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.kind, self.model, self.endpoint)
    }
}

/// Input to one generation step
#[derive(Clone, Copy, Debug)]
pub struct StepRequest<'a> {
    /// Rendered instruction preamble (role, protocol, tool list)
    pub instructions: &'a str,

    /// Conversation so far; never empty
    pub conversation: &'a [Message],

    /// Tools the model may call
    pub tools: &'a [ToolSchema],
}

impl<'a> StepRequest<'a> {
    pub const fn new(
        instructions: &'a str,
        conversation: &'a [Message],
        tools: &'a [ToolSchema],
    ) -> Self {
        Self {
            instructions,
            conversation,
            tools,
        }
    }
}

/// An action returned through a backend's native function calling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeAction {
    pub name: String,
    pub input: Value,
}

/// Raw backend response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Native tool call, if the backend returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NativeAction>,

    /// Token usage statistics (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Interpret the completion as a model step
    pub fn into_step(self, tools: &[ToolSchema]) -> Result<ModelStep> {
        match self.action {
            Some(action) => ModelStep::from_action(&action.name, action.input, tools),
            None => parse_step(&self.content, tools),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Strategy trait for model backends
///
/// Implementors provide the transport (`complete`); the shared `generate`
/// turns a completion into a [`ModelStep`]. Each instance is bound to one
/// backend for its whole lifetime.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Backend this adapter is bound to
    fn identity(&self) -> &BackendIdentity;

    /// Check if the backend is reachable and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Send one request to the backend
    async fn complete(&self, request: &StepRequest<'_>) -> Result<Completion>;

    /// Produce the next step for a conversation
    async fn generate(&self, request: &StepRequest<'_>) -> Result<ModelStep> {
        if request.conversation.is_empty() {
            return Err(AgentError::InvalidRequest("conversation is empty".into()));
        }
        let completion = self.complete(request).await?;
        completion.into_step(request.tools)
    }
}
