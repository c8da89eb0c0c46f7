//! # agent-core
//!
//! Backend-agnostic agent orchestration: model adapter contract, validated
//! tool execution and retrieval grounding.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Orchestrator                            │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────────┐  │
//! │  │   State     │  │    Tool      │  │   ModelAdapter          │  │
//! │  │   Machine   │──│   Registry   │  │   (Strategy)            │  │
//! │  └──────┬──────┘  └──────────────┘  └─────────────────────────┘  │
//! │         │         ┌──────────────┐                               │
//! │         └─────────│  Retriever   │                               │
//! │                   └──────────────┘                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelAdapter` trait lets the same orchestrator drive a locally hosted
//! model or a remote API model; the `Retriever` trait plugs in any document
//! store.

pub mod error;
pub mod message;
pub mod profile;
pub mod prompt;
pub mod provider;
pub mod reasoning;
pub mod retrieval;
pub mod state;
pub mod step;
pub mod team;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{AgentError, ErrorKind, Result};
pub use message::{Conversation, Message, Role};
pub use profile::AgentProfile;
pub use prompt::PromptBuilder;
pub use provider::{AdapterConfig, BackendIdentity, Completion, ModelAdapter, StepRequest};
pub use reasoning::{AgentConfig, Orchestrator, OrchestratorBuilder};
pub use retrieval::{Embedder, Passage, Retriever};
pub use state::{RunOutcome, TerminationReason, Transcript};
pub use step::ModelStep;
pub use team::{Team, WorkerTool};
pub use tool::{CalculatorTool, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
