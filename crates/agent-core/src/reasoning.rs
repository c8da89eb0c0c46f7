//! Reasoning Loop
//!
//! Drives the observe / think / act cycle as an explicit state machine:
//!
//! ```text
//!                 ┌──────────── tool result ────────────┐
//!                 ▼                                     │
//!   request ─► AwaitingModel ──tool call──► AwaitingTool
//!                 │    ▲
//!                 │    └──── passages ──── AwaitingRetrieval ◄──retrieve──┐
//!                 │                                                       │
//!                 ├──────────────────────────────────────────────────────┘
//!                 ▼
//!               Done (answered | turn_limit | fatal_error)
//! ```
//!
//! Tool and retrieval failures are fed back to the model as observations;
//! only adapter failures end a run early.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::prompt::PromptBuilder;
use crate::provider::{ModelAdapter, StepRequest};
use crate::retrieval::{Retriever, format_passages};
use crate::state::{
    AgentState, Phase, RunError, RunOutcome, Termination, TranscriptEvent,
};
use crate::step::ModelStep;
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Default model turns per run
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Default passages per retrieval
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 4;

/// Agent configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Instruction preamble
    #[serde(default)]
    pub prompt: PromptBuilder,

    /// Model turns before the run ends with `turn_limit`
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Passages requested per retrieval
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,
}

const fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

const fn default_top_k() -> usize {
    DEFAULT_RETRIEVAL_TOP_K
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prompt: PromptBuilder::default(),
            max_turns: DEFAULT_MAX_TURNS,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
        }
    }
}

/// Runs requests against one adapter, one tool registry and an optional
/// retriever. Holds no per-run state, so one instance serves concurrent runs.
pub struct Orchestrator {
    adapter: Arc<dyn ModelAdapter>,
    tools: Arc<ToolRegistry>,
    retriever: Option<Arc<dyn Retriever>>,
    config: AgentConfig,
    schemas: Vec<ToolSchema>,
    instructions: String,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backend", self.adapter.identity())
            .field("tools", &self.tools.names())
            .field("retrieval", &self.retriever.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        tools: Arc<ToolRegistry>,
        retriever: Option<Arc<dyn Retriever>>,
        config: AgentConfig,
    ) -> Self {
        let schemas = tools.schemas();
        let instructions = config.prompt.render(&schemas, retriever.is_some());
        Self {
            adapter,
            tools,
            retriever,
            config,
            schemas,
            instructions,
        }
    }

    /// Create with default configuration and no retriever
    pub fn with_defaults(adapter: Arc<dyn ModelAdapter>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(adapter, tools, None, AgentConfig::default())
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run one request on top of an optional prior history.
    ///
    /// Never fails: errors that stop the run are reported through
    /// [`RunOutcome::reason`] and [`RunOutcome::error`], with the partial
    /// transcript attached.
    pub async fn run(&self, request: &str, history: Vec<Message>) -> RunOutcome {
        let mut state = AgentState::new(Conversation::from_history(history), self.config.max_turns);
        state.conversation.push(Message::user(request));

        tracing::info!(
            backend = %self.adapter.identity(),
            max_turns = self.config.max_turns,
            "Starting agent run"
        );

        loop {
            let phase = state.take_phase();
            let next = match &phase {
                Phase::Done(termination) => {
                    let outcome = state.into_outcome(termination.clone());
                    tracing::info!(
                        reason = %outcome.reason,
                        turns = outcome.turns,
                        "Agent run finished"
                    );
                    return outcome;
                }
                Phase::AwaitingModel => self.model_turn(&mut state).await,
                Phase::AwaitingTool(call) => self.tool_turn(&mut state, call).await,
                Phase::AwaitingRetrieval(query) => self.retrieval_turn(&mut state, query).await,
            };
            state.transition(&phase, next);
        }
    }

    /// Run a single question with no prior history
    pub async fn ask(&self, question: &str) -> RunOutcome {
        self.run(question, Vec::new()).await
    }

    async fn model_turn(&self, state: &mut AgentState) -> Phase {
        if !state.begin_turn() {
            tracing::warn!(max_turns = state.max_turns(), "Turn limit reached");
            return Phase::Done(Termination::TurnLimit);
        }
        let turn = state.turn();

        let request =
            StepRequest::new(&self.instructions, state.conversation.messages(), &self.schemas);
        let step = match self.adapter.generate(&request).await {
            Ok(step) => step,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(turn, error = %e, "Model step rejected");
                let text =
                    format!("Observation: the previous step was rejected ({}): {e}", e.kind());
                state.conversation.push(Message::tool_error(text, None));
                state.record(TranscriptEvent::Failure {
                    turn,
                    error: RunError::from(&e),
                });
                return Phase::AwaitingModel;
            }
            Err(e) => {
                tracing::error!(turn, error = %e, "Model adapter failed");
                let error = RunError::from(&e);
                state.record(TranscriptEvent::Failure {
                    turn,
                    error: error.clone(),
                });
                return Phase::Done(Termination::Fatal(error));
            }
        };

        let mut step = step;
        let ordinal = state.conversation.len();
        if let ModelStep::RequestToolCall { call } = &mut step {
            call.ordinal = Some(ordinal);
        }
        state
            .conversation
            .push(Message::agent(step.render()).with_model(&self.adapter.identity().model));
        tracing::debug!(turn, step = step.kind(), "Model step");
        state.record(TranscriptEvent::Step {
            turn,
            ordinal,
            step: step.clone(),
        });

        match step {
            ModelStep::FinalAnswer { answer } => Phase::Done(Termination::Answered(answer)),
            ModelStep::RequestToolCall { call } => Phase::AwaitingTool(call),
            ModelStep::RequestRetrieval { query } => Phase::AwaitingRetrieval(query),
        }
    }

    async fn tool_turn(&self, state: &mut AgentState, call: &ToolCall) -> Phase {
        tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        let result = self.tools.invoke(call).await;

        let content = format_tool_result(&result);
        let message = if result.success {
            Message::tool(content, Some(call.id.clone()))
        } else {
            Message::tool_error(content, Some(call.id.clone()))
        };
        let ordinal = state.conversation.push(message);
        state.record(TranscriptEvent::ToolResult { ordinal, result });
        Phase::AwaitingModel
    }

    async fn retrieval_turn(&self, state: &mut AgentState, query: &str) -> Phase {
        let found = match &self.retriever {
            Some(retriever) => retriever.retrieve(query, self.config.retrieval_top_k).await,
            None => Err(AgentError::Config(
                "no document retriever is configured for this agent".into(),
            )),
        };

        let (message, passages, error) = match found {
            Ok(passages) => {
                tracing::debug!(query, passages = passages.len(), "Retrieved passages");
                (Message::tool(format_passages(query, &passages), None), passages, None)
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Retrieval failed");
                let text = format!("Observation: retrieval failed ({}): {e}", e.kind());
                (Message::tool_error(text, None), Vec::new(), Some(RunError::from(&e)))
            }
        };
        let ordinal = state.conversation.push(message);
        state.record(TranscriptEvent::Retrieval {
            ordinal,
            query: query.to_string(),
            passages,
            error,
        });
        Phase::AwaitingModel
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn ModelAdapter> {
        &self.adapter
    }

    pub fn retriever(&self) -> Option<&Arc<dyn Retriever>> {
        self.retriever.as_ref()
    }

    /// Rendered instruction preamble
    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

/// Format tool result for conversation
fn format_tool_result(result: &ToolResult) -> String {
    match (result.success, result.error) {
        (true, _) => format!("Observation from {}: {}", result.name, result.output),
        (false, Some(kind)) => {
            format!("Observation: {} failed ({kind}): {}", result.name, result.output)
        }
        (false, None) => format!("Observation: {} failed: {}", result.name, result.output),
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    adapter: Option<Arc<dyn ModelAdapter>>,
    tools: ToolRegistry,
    retriever: Option<Arc<dyn Retriever>>,
    config: AgentConfig,
    error: Option<AgentError>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            adapter: None,
            tools: ToolRegistry::new(),
            retriever: None,
            config: AgentConfig::default(),
            error: None,
        }
    }

    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn ModelAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Register a tool; registration errors surface from [`build`](Self::build)
    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        if let Err(e) = self.tools.register(tool) {
            self.error.get_or_insert(e);
        }
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.config.prompt = prompt;
        self
    }

    #[must_use]
    pub fn role(mut self, role_definition: impl Into<String>) -> Self {
        self.config.prompt.role_definition = role_definition.into();
        self
    }

    #[must_use]
    pub const fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = max;
        self
    }

    #[must_use]
    pub const fn retrieval_top_k(mut self, k: usize) -> Self {
        self.config.retrieval_top_k = k;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let adapter = self
            .adapter
            .ok_or_else(|| AgentError::Config("a model adapter is required".into()))?;
        if self.config.max_turns == 0 {
            return Err(AgentError::Config("max_turns must be at least 1".into()));
        }

        Ok(Orchestrator::new(
            adapter,
            Arc::new(self.tools),
            self.retriever,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message::Role;
    use crate::provider::{BackendIdentity, Completion};
    use crate::retrieval::Passage;
    use crate::state::TerminationReason;
    use crate::testing::{Scripted, ScriptedAdapter};
    use crate::tool::{Arguments, CalculatorTool, ParamType, ParameterSchema};
    use async_trait::async_trait;

    fn calculator_call(expression: &str) -> ModelStep {
        ModelStep::tool_call(
            ToolCall::new("calculator", Arguments::new()).with_arg("expression", expression),
        )
    }

    fn agent(adapter: Arc<ScriptedAdapter>, max_turns: usize) -> Orchestrator {
        Orchestrator::builder()
            .adapter(adapter)
            .tool(CalculatorTool)
            .max_turns(max_turns)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let adapter = Arc::new(ScriptedAdapter::texts(["Hello! How can I help?"]));
        let outcome = agent(adapter.clone(), 5).ask("hi").await;

        assert_eq!(outcome.reason, TerminationReason::Answered);
        assert_eq!(outcome.answer.as_deref(), Some("Hello! How can I help?"));
        assert_eq!(outcome.turns, 1);
        assert_eq!(outcome.transcript.messages.len(), 2);
        assert_eq!(outcome.transcript.messages[1].role, Role::Agent);

        let requests = adapter.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools, vec!["calculator"]);
        assert!(requests[0].instructions.contains("### calculator"));
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let adapter = Arc::new(ScriptedAdapter::texts([
            concat!(
                "Thought: add them.\n",
                r#"Action: {"tool_name": "calculator", "tool_input": "15 + 27"}"#,
            ),
            "Action: {\"tool_name\": \"final_answer\", \"tool_input\": \"15 + 27 = 42\"}",
        ]));
        let outcome = agent(adapter.clone(), 5).ask("What is 15 + 27?").await;

        assert!(outcome.is_answered());
        assert_eq!(outcome.answer.as_deref(), Some("15 + 27 = 42"));
        assert_eq!(outcome.turns, 2);

        let calls: Vec<_> = outcome.transcript.tool_calls().collect();
        let results: Vec<_> = outcome.transcript.tool_results().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].output, "42");
        assert_eq!(results[0].call_id, calls[0].id);
        assert_eq!(calls[0].ordinal, Some(1));

        // The second request saw the observation
        let second = &adapter.requests()[1];
        let observation = second.messages.last().unwrap();
        assert_eq!(observation.role, Role::Tool);
        assert_eq!(observation.tool_call_id(), Some(calls[0].id.as_str()));
        assert!(observation.content.contains("42"));
    }

    #[tokio::test]
    async fn test_tool_error_is_observed_and_run_continues() {
        let adapter = Arc::new(ScriptedAdapter::steps([
            calculator_call("2/0"),
            ModelStep::final_answer("Division by zero is undefined."),
        ]));
        let outcome = agent(adapter.clone(), 5).ask("What is 2/0?").await;

        assert!(outcome.is_answered());
        let result = outcome.transcript.tool_results().next().unwrap();
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Evaluation));

        let observation = &adapter.requests()[1].messages[2];
        assert!(observation.is_error());
        assert!(observation.content.contains("evaluation_error"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_observed() {
        let adapter = Arc::new(ScriptedAdapter::steps([
            ModelStep::tool_call(ToolCall::new("weather", Arguments::new())),
            ModelStep::final_answer("I cannot check the weather."),
        ]));
        let outcome = agent(adapter, 5).ask("Weather?").await;

        assert!(outcome.is_answered());
        let result = outcome.transcript.tool_results().next().unwrap();
        assert_eq!(result.error, Some(ErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let adapter = Arc::new(ScriptedAdapter::steps([
            calculator_call("1+1"),
            calculator_call("2+2"),
            calculator_call("3+3"),
        ]));
        let outcome = agent(adapter.clone(), 2).ask("loop forever").await;

        assert_eq!(outcome.reason, TerminationReason::TurnLimit);
        assert_eq!(outcome.answer, None);
        assert_eq!(outcome.turns, 2);
        assert_eq!(adapter.requests().len(), 2);
        assert_eq!(adapter.remaining(), 1);
        assert_eq!(outcome.transcript.tool_results().count(), 2);
    }

    #[tokio::test]
    async fn test_adapter_failure_is_fatal() {
        let adapter = Arc::new(ScriptedAdapter::new([
            Scripted::Step(calculator_call("1+1")),
            Scripted::Error(AgentError::Authentication("invalid API key".into())),
        ]));
        let outcome = agent(adapter, 5).ask("hi").await;

        assert_eq!(outcome.reason, TerminationReason::FatalError);
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Authentication);
        // Partial transcript survives: user, agent, tool
        assert_eq!(outcome.transcript.messages.len(), 3);
        assert!(matches!(
            outcome.transcript.events.last(),
            Some(TranscriptEvent::Failure { turn: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal() {
        let adapter = Arc::new(ScriptedAdapter::texts(["Action: not json"]));
        let outcome = agent(adapter, 5).ask("hi").await;
        assert_eq!(outcome.reason, TerminationReason::FatalError);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_bare_input_for_unregistered_tool_is_observed() {
        let adapter = Arc::new(ScriptedAdapter::texts([
            r#"Action: {"tool_name": "weather", "tool_input": "Paris"}"#,
            "Final Answer: I cannot check the weather.",
        ]));
        let outcome = agent(adapter.clone(), 5).ask("Weather in Paris?").await;

        assert_eq!(outcome.reason, TerminationReason::Answered);
        let result = outcome.transcript.tool_results().next().unwrap();
        assert_eq!(result.error, Some(ErrorKind::UnknownTool));
        assert!(adapter.requests()[1].messages.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_bare_input_for_multi_parameter_tool_is_invalid_arguments() {
        let mut tools = ToolRegistry::new();
        tools
            .register_fn(
                ToolSchema::new("convert", "Convert units")
                    .param(ParameterSchema::required("value", ParamType::Number, "Amount"))
                    .param(ParameterSchema::required("unit", ParamType::String, "Target unit")),
                |_| Ok(serde_json::json!("unreachable")),
            )
            .unwrap();
        let adapter = Arc::new(ScriptedAdapter::texts([
            r#"Action: {"tool_name": "convert", "tool_input": "3 km"}"#,
            "Final Answer: please give value and unit separately.",
        ]));
        let orchestrator = Orchestrator::builder().adapter(adapter).tools(tools).build().unwrap();
        let outcome = orchestrator.ask("Convert 3 km").await;

        assert!(outcome.is_answered());
        let result = outcome.transcript.tool_results().next().unwrap();
        assert_eq!(result.error, Some(ErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_recoverable_adapter_error_uses_a_turn() {
        let adapter = Arc::new(ScriptedAdapter::new([
            Scripted::Error(AgentError::InvalidArguments("bad native arguments".into())),
            Scripted::Text("Recovered.".into()),
        ]));
        let outcome = agent(adapter.clone(), 5).ask("hi").await;

        assert!(outcome.is_answered());
        assert_eq!(outcome.turns, 2);
        let rejected = &adapter.requests()[1].messages[1];
        assert!(rejected.is_error());
        assert!(rejected.content.contains("invalid_arguments_error"));
    }

    #[tokio::test]
    async fn test_history_is_preserved_and_extended() {
        let adapter = Arc::new(ScriptedAdapter::texts(["Your name is Ada."]));
        let history = vec![
            Message::user("My name is Ada."),
            Message::agent("Nice to meet you, Ada."),
        ];
        let outcome = agent(adapter.clone(), 3).run("What is my name?", history).await;

        let messages = &outcome.transcript.messages;
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().enumerate().all(|(i, m)| m.ordinal == i));
        assert_eq!(adapter.requests()[0].messages.len(), 3);
    }

    struct SkyRetriever;

    #[async_trait]
    impl Retriever for SkyRetriever {
        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Passage>> {
            Ok(vec![Passage {
                document_id: "sky".into(),
                source: "sky.txt".into(),
                chunk_index: 0,
                text: "The sky is blue.".into(),
                score: 0.9,
            }]
            .into_iter()
            .take(k)
            .collect())
        }
    }

    #[tokio::test]
    async fn test_retrieval_grounds_the_answer() {
        let adapter = Arc::new(ScriptedAdapter::steps([
            ModelStep::retrieval("sky color"),
            ModelStep::final_answer("The sky is blue (source: sky.txt)."),
        ]));
        let orchestrator = Orchestrator::builder()
            .adapter(adapter.clone())
            .retriever(Arc::new(SkyRetriever))
            .build()
            .unwrap();
        assert!(orchestrator.instructions().contains("`retrieve`"));

        let outcome = orchestrator.ask("What color is the sky?").await;
        assert!(outcome.is_answered());

        let observation = &adapter.requests()[1].messages[2];
        assert_eq!(observation.role, Role::Tool);
        assert!(observation.content.contains("source: sky.txt"));
        assert!(matches!(
            &outcome.transcript.events[1],
            TranscriptEvent::Retrieval { passages, error: None, .. } if passages.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_retrieval_without_retriever_is_observed() {
        let adapter = Arc::new(ScriptedAdapter::steps([
            ModelStep::retrieval("anything"),
            ModelStep::final_answer("No documents available."),
        ]));
        let outcome = agent(adapter.clone(), 5).ask("Search the docs").await;

        assert!(outcome.is_answered());
        assert!(adapter.requests()[1].messages[2].is_error());
    }

    /// Answers with the last user message, upper-cased, after a short delay
    struct EchoAdapter(BackendIdentity);

    #[async_trait]
    impl ModelAdapter for EchoAdapter {
        fn identity(&self) -> &BackendIdentity {
            &self.0
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, request: &StepRequest<'_>) -> Result<Completion> {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let last = request.conversation.last().map(|m| m.content.to_uppercase());
            Ok(Completion::text(last.unwrap_or_default()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_are_isolated() {
        let adapter = Arc::new(EchoAdapter(BackendIdentity {
            kind: "echo".into(),
            model: "echo".into(),
            endpoint: "memory://".into(),
        }));
        let orchestrator =
            Arc::new(Orchestrator::with_defaults(adapter, Arc::new(ToolRegistry::new())));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.ask(&format!("request {i}")).await })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.answer, Some(format!("REQUEST {i}")));
            assert_eq!(outcome.transcript.messages.len(), 2);
        }
    }

    #[test]
    fn test_builder_requires_adapter_and_turns() {
        assert!(matches!(OrchestratorBuilder::new().build(), Err(AgentError::Config(_))));

        let adapter = Arc::new(ScriptedAdapter::texts(["x"]));
        let result = Orchestrator::builder().adapter(adapter).max_turns(0).build();
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_builder_surfaces_duplicate_tools() {
        let adapter = Arc::new(ScriptedAdapter::texts(["x"]));
        let result = Orchestrator::builder()
            .adapter(adapter)
            .tool(CalculatorTool)
            .tool(CalculatorTool)
            .build();
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
