//! # agent-runtime
//!
//! Model adapters and embedders for agent-core.
//!
//! ## Adapters
//!
//! - **Ollama** (default feature): locally hosted models via Ollama
//! - **Remote API**: any OpenAI-compatible chat completions endpoint
//!
//! Every adapter runs its backend calls through a [`CallGuard`], which caps
//! concurrency, applies the per-call timeout and retries transient failures.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::RemoteApiAdapter;
//!
//! let config = AdapterConfig::new("gpt-4o-mini", DEFAULT_API_BASE).credential(key);
//! let adapter = RemoteApiAdapter::new(config)?;
//! let agent = Orchestrator::builder()
//!     .adapter(Arc::new(adapter))
//!     .tool(CalculatorTool)
//!     .build()?;
//! ```

pub mod guard;
pub mod remote;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use guard::CallGuard;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaAdapter, OllamaConfig, OllamaEmbedder};
pub use remote::{DEFAULT_API_BASE, RemoteApiAdapter};

// Re-export core types for convenience
pub use agent_core::{AdapterConfig, AgentError, Message, ModelAdapter, Orchestrator, Result, Role};
