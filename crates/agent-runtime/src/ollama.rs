//! Ollama Model Adapter
//!
//! Implementation of `ModelAdapter` and `Embedder` for locally hosted models
//! served by Ollama.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        AdapterConfig, BackendIdentity, Completion, GenerationOptions, ModelAdapter, StepRequest,
    },
    retrieval::Embedder,
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::{
        chat::{ChatMessage, MessageRole, request::ChatMessageRequest},
        embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    },
    models::ModelOptions,
};

use crate::guard::CallGuard;

/// Where the Ollama server listens
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }

    fn client(&self) -> Result<Ollama> {
        reqwest::Url::parse(&self.host)
            .map_err(|e| AgentError::Config(format!("invalid Ollama host '{}': {e}", self.host)))?;
        Ok(Ollama::new(self.host.trim_end_matches('/'), self.port))
    }
}

fn unavailable(e: impl std::fmt::Display) -> AgentError {
    AgentError::BackendUnavailable(format!("ollama: {e}"))
}

/// Adapter bound to one model on one Ollama server
pub struct OllamaAdapter {
    client: Ollama,
    identity: BackendIdentity,
    generation: GenerationOptions,
    guard: CallGuard,
}

impl std::fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaAdapter")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Bind to `config.model` on the given server
    pub fn new(server: &OllamaConfig, config: &AdapterConfig) -> Result<Self> {
        let client = server.client()?;
        Ok(Self {
            client,
            identity: BackendIdentity {
                kind: "ollama".into(),
                model: config.model.clone(),
                endpoint: server.endpoint(),
            },
            generation: config.generation.clone(),
            guard: CallGuard::new(config),
        })
    }

    /// Bind to a model on the local default server
    pub fn localhost(model: impl Into<String>) -> Result<Self> {
        let server = OllamaConfig::default();
        let config = AdapterConfig::new(model, server.endpoint());
        Self::new(&server, &config)
    }

    /// Convert the request to Ollama chat messages
    fn convert_messages(request: &StepRequest<'_>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.conversation.len() + 1);
        if !request.instructions.is_empty() {
            messages.push(ChatMessage::new(MessageRole::System, request.instructions.to_string()));
        }
        messages.extend(request.conversation.iter().map(Self::convert_message));
        messages
    }

    fn convert_message(message: &Message) -> ChatMessage {
        let role = match message.role {
            Role::User => MessageRole::User,
            Role::Agent => MessageRole::Assistant,
            Role::Tool => MessageRole::User, // Observations appear as user context
        };
        ChatMessage::new(role, message.content.clone())
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));
        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(models) => {
                let model = self.identity.model.as_str();
                let found = models
                    .iter()
                    .any(|m| m.name == model || m.name.split(':').next() == Some(model));
                if !found {
                    tracing::warn!(model, "Model is not pulled on the Ollama server");
                }
                Ok(found)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &StepRequest<'_>) -> Result<Completion> {
        let messages = Self::convert_messages(request);
        let options = Self::build_options(&self.generation);

        let response = self
            .guard
            .run("ollama chat", || {
                let chat = ChatMessageRequest::new(self.identity.model.clone(), messages.clone())
                    .options(options.clone());
                async move { self.client.send_chat_messages(chat).await.map_err(unavailable) }
            })
            .await?;

        tracing::debug!(
            model = %self.identity.model,
            chars = response.message.content.len(),
            "Ollama completion"
        );
        Ok(Completion::text(response.message.content))
    }
}

/// Embeddings from a model on an Ollama server
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
    guard: CallGuard,
}

impl OllamaEmbedder {
    pub fn new(server: &OllamaConfig, config: &AdapterConfig) -> Result<Self> {
        Ok(Self {
            client: server.client()?,
            model: config.model.clone(),
            guard: CallGuard::new(config),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AgentError::Embedding("cannot embed empty text".into()));
        }

        let response = self
            .guard
            .run("ollama embed", || {
                let input = EmbeddingsInput::Single(text.to_string());
                let request = GenerateEmbeddingsRequest::new(self.model.clone(), input);
                async move { self.client.generate_embeddings(request).await.map_err(unavailable) }
            })
            .await
            .map_err(|e| match e {
                AgentError::BackendUnavailable(msg) => AgentError::Embedding(msg),
                other => other,
            })?;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AgentError::Embedding("ollama returned no embedding".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.endpoint(), "http://localhost:11434");
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let server = OllamaConfig {
            host: "not a url".into(),
            port: 11434,
        };
        let result = OllamaAdapter::new(&server, &AdapterConfig::default());
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::user("What is 2+2?"),
            Message::agent("Action: {\"tool_name\": \"calculator\", \"tool_input\": \"2+2\"}"),
            Message::tool("Observation from calculator: 4", None),
        ];
        let request = StepRequest::new("You are helpful.", &messages, &[]);

        let converted = OllamaAdapter::convert_messages(&request);
        assert_eq!(converted.len(), 4);
        assert!(matches!(converted[0].role, MessageRole::System));
        assert!(matches!(converted[2].role, MessageRole::Assistant));
        assert!(matches!(converted[3].role, MessageRole::User));
    }

    #[test]
    fn test_identity() {
        let adapter = OllamaAdapter::localhost("llama3.2").unwrap();
        assert_eq!(adapter.identity().kind, "ollama");
        assert_eq!(adapter.identity().to_string(), "ollama:llama3.2@http://localhost:11434");
    }

    #[tokio::test]
    async fn test_blank_text_is_not_embedded() {
        let config = AdapterConfig::new("nomic-embed-text", "");
        let embedder = OllamaEmbedder::new(&OllamaConfig::default(), &config).unwrap();
        assert!(matches!(embedder.embed("  ").await, Err(AgentError::Embedding(_))));
    }
}
