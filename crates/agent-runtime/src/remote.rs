//! Remote API Model Adapter
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint over HTTPS with
//! a bearer credential. Tool schemas are offered through native function
//! calling; a returned tool call takes precedence over the text content.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        AdapterConfig, BackendIdentity, Completion, Credential, ModelAdapter, NativeAction,
        StepRequest, TokenUsage,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guard::CallGuard;

/// Default base URL for remote API models
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Adapter bound to one model behind one remote endpoint
pub struct RemoteApiAdapter {
    http: reqwest::Client,
    credential: Credential,
    identity: BackendIdentity,
    config: AdapterConfig,
    guard: CallGuard,
}

impl std::fmt::Debug for RemoteApiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApiAdapter")
            .field("identity", &self.identity)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl RemoteApiAdapter {
    /// Fails with `Authentication` when the credential is missing or blank
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let credential = config.require_credential()?.clone();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            credential,
            identity: BackendIdentity {
                kind: "remote-api".into(),
                model: config.model.clone(),
                endpoint,
            },
            guard: CallGuard::new(&config),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.identity.endpoint)
    }

    fn build_request(&self, request: &StepRequest<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.conversation.len() + 1);
        if !request.instructions.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: request.instructions.to_string(),
            });
        }
        messages.extend(request.conversation.iter().map(convert_message));

        let tools = request
            .tools
            .iter()
            .map(|schema| WireTool {
                kind: "function",
                function: WireFunction {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    parameters: schema.to_json_schema(),
                },
            })
            .collect();

        let generation = &self.config.generation;
        ChatRequest {
            model: self.identity.model.clone(),
            messages,
            temperature: generation.temperature,
            top_p: generation.top_p,
            max_tokens: generation.max_tokens,
            stop: (!generation.stop_sequences.is_empty())
                .then(|| generation.stop_sequences.clone()),
            tools,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<Completion> {
        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(self.credential.expose())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }
        parse_response(&text)
    }
}

fn convert_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::User => "user",
        Role::Agent => "assistant",
        // Observations are not paired with native tool_calls in the history
        Role::Tool => "user",
    };
    WireMessage {
        role,
        content: message.content.clone(),
    }
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::BackendUnavailable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        AgentError::BackendUnavailable(format!("connection failed: {e}"))
    } else if e.is_decode() {
        AgentError::MalformedResponse(e.to_string())
    } else {
        AgentError::BackendUnavailable(e.to_string())
    }
}

/// Map a non-success HTTP status to an error
pub fn classify_status(status: StatusCode, body: &str) -> AgentError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .map_or_else(|| truncate(body, 200), |e| e.message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AgentError::Authentication(format!("{status}: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            AgentError::BackendUnavailable(format!("{status}: {detail}"))
        }
        s if s.is_server_error() => AgentError::BackendUnavailable(format!("{status}: {detail}")),
        _ => AgentError::InvalidRequest(format!("{status}: {detail}")),
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Turn a chat completion body into a [`Completion`]
pub fn parse_response(body: &str) -> Result<Completion> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::MalformedResponse(format!("invalid completion body: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::MalformedResponse("response has no choices".into()))?;

    let action = match choice.message.tool_calls.unwrap_or_default().into_iter().next() {
        Some(call) => {
            let input = if call.function.arguments.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    AgentError::MalformedResponse(format!(
                        "tool call arguments for '{}' are not JSON: {e}",
                        call.function.name
                    ))
                })?
            };
            Some(NativeAction {
                name: call.function.name,
                input,
            })
        }
        None => None,
    };

    let content = choice.message.content.unwrap_or_default();
    if action.is_none() && content.trim().is_empty() {
        return Err(AgentError::MalformedResponse("completion has no content".into()));
    }

    Ok(Completion {
        content,
        action,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

#[async_trait]
impl ModelAdapter for RemoteApiAdapter {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .http
            .get(self.url("models"))
            .bearer_auth(self.credential.expose())
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) if matches!(r.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(AgentError::Authentication(format!(
                    "{} rejected the credential",
                    self.identity.endpoint
                )))
            }
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Remote API health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote API health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &StepRequest<'_>) -> Result<Completion> {
        let body = self.build_request(request);
        let completion = self.guard.run("remote chat", || self.send(&body)).await?;

        if let Some(usage) = completion.usage {
            tracing::debug!(
                model = %self.identity.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Remote completion"
            );
        }
        Ok(completion)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
