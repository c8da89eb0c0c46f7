//! Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Credential missing or rejected by the backend
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport failure, timeout, or backend overload
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend output could not be turned into a model step
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request violates an adapter precondition (e.g. empty conversation)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments do not match the registered schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Calculator (or other pure handler) could not evaluate its input
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Tool did not finish within the invocation timeout
    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    /// Tool handler failed for another reason
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Embedding backend failure or empty text
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Entries scored under different similarity metrics
    #[error("Inconsistent metric: store uses {expected}, got {found}")]
    InconsistentMetric { expected: String, found: String },

    /// Vector dimensionality differs from the store's
    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

/// Stable tag for an error, attached to failed tool results and transcripts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    BackendUnavailable,
    MalformedResponse,
    InvalidRequest,
    UnknownTool,
    InvalidArguments,
    Evaluation,
    ToolTimeout,
    ToolExecution,
    Embedding,
    InconsistentMetric,
    DimensionMismatch,
    Config,
    Io,
    Json,
    Other,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication_error",
            Self::BackendUnavailable => "backend_unavailable_error",
            Self::MalformedResponse => "malformed_response_error",
            Self::InvalidRequest => "invalid_request_error",
            Self::UnknownTool => "unknown_tool_error",
            Self::InvalidArguments => "invalid_arguments_error",
            Self::Evaluation => "evaluation_error",
            Self::ToolTimeout => "tool_timeout_error",
            Self::ToolExecution => "tool_execution_error",
            Self::Embedding => "embedding_error",
            Self::InconsistentMetric => "inconsistent_metric_error",
            Self::DimensionMismatch => "dimension_mismatch_error",
            Self::Config => "config_error",
            Self::Io => "io_error",
            Self::Json => "json_error",
            Self::Other => "error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AgentError {
    /// Tag for this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::Evaluation(_) => ErrorKind::Evaluation,
            Self::ToolTimeout { .. } => ErrorKind::ToolTimeout,
            Self::ToolExecution(_) => ErrorKind::ToolExecution,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::InconsistentMetric { .. } => ErrorKind::InconsistentMetric,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Adapter-layer errors end an orchestrator run; everything else is
    /// recovered inside the conversation.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::BackendUnavailable(_)
                | Self::MalformedResponse(_)
                | Self::InvalidRequest(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(_) => {
                "Authentication failed. Please check your credentials.".into()
            }
            Self::BackendUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::MalformedResponse(_) => {
                "The AI service returned a response that could not be understood.".into()
            }
            Self::InvalidRequest(msg) => format!("Invalid request: {msg}"),
            Self::UnknownTool(name) => format!("The tool '{name}' is not available."),
            Self::InvalidArguments(msg) => format!("Invalid tool input: {msg}"),
            Self::Evaluation(msg) => format!("Could not evaluate expression: {msg}"),
            Self::ToolTimeout { tool, .. } => {
                format!("The tool '{tool}' took too long to respond.")
            }
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Embedding(_) => "Document search is currently unavailable.".into(),
            Self::InconsistentMetric { .. } | Self::DimensionMismatch { .. } => {
                "The document index does not match the configured embedder.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::Authentication("no key".into()).is_fatal());
        assert!(AgentError::BackendUnavailable("down".into()).is_fatal());
        assert!(!AgentError::Evaluation("2/0".into()).is_fatal());
        assert!(!AgentError::UnknownTool("x".into()).is_fatal());
    }

    #[test]
    fn test_only_backend_unavailable_is_retryable() {
        assert!(AgentError::BackendUnavailable("timeout".into()).is_retryable());
        assert!(!AgentError::Authentication("401".into()).is_retryable());
        assert!(!AgentError::MalformedResponse("junk".into()).is_retryable());
    }

    #[test]
    fn test_kind_tags() {
        let err = AgentError::ToolTimeout { tool: "calculator".into(), timeout_ms: 5 };
        assert_eq!(err.kind(), ErrorKind::ToolTimeout);
        assert_eq!(err.kind().as_str(), "tool_timeout_error");
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidArguments).unwrap(),
            "\"invalid_arguments\""
        );
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = AgentError::Authentication("sk-live-123 rejected".into());
        assert!(!err.user_message().contains("sk-live-123"));
        assert_eq!(
            AgentError::InvalidRequest("query must not be empty".into()).user_message(),
            "Invalid request: query must not be empty"
        );
    }
}
