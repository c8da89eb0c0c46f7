//! Multi-Agent Delegation
//!
//! A manager agent delegates sub-tasks to specialised worker agents. Each
//! worker is exposed to the manager as an ordinary tool, so delegation goes
//! through the same validation, timeout and observation path as any other
//! tool call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, ErrorKind, Result};
use crate::prompt::PromptBuilder;
use crate::provider::ModelAdapter;
use crate::reasoning::{AgentConfig, Orchestrator};
use crate::tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Argument carrying the delegated sub-task
pub const TASK_ARG: &str = "task";

/// Default bound on one delegated run
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(120);

const MANAGER_ROLE: &str = "You are a manager agent. You do not solve tasks yourself. \
Break the user's request into sub-tasks, delegate each one to the worker best suited for it \
by calling that worker with a `task`, then combine the workers' results into one final answer.";

/// A worker agent callable as a tool
pub struct WorkerTool {
    name: String,
    role: String,
    agent: Arc<Orchestrator>,
}

impl WorkerTool {
    pub fn new(name: impl Into<String>, role: impl Into<String>, agent: Arc<Orchestrator>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            agent,
        }
    }
}

#[async_trait]
impl Tool for WorkerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(&self.name, &self.role)
            .param(ParameterSchema::required(
                TASK_ARG,
                ParamType::String,
                "Self-contained description of the sub-task",
            ))
            .category("worker")
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let task = call
            .str_arg(TASK_ARG)
            .ok_or_else(|| AgentError::InvalidArguments(format!("'{TASK_ARG}' must be a string")))?;

        tracing::info!(worker = %self.name, "Delegating task");
        let outcome = self.agent.ask(task).await;
        let details = serde_json::json!({
            "reason": outcome.reason,
            "turns": outcome.turns,
        });

        match outcome.answer {
            Some(answer) => Ok(ToolResult::success(&self.name, answer).with_data(details)),
            None => {
                let kind = outcome.error.as_ref().map_or(ErrorKind::ToolExecution, |e| e.kind);
                let mut message = format!(
                    "worker '{}' stopped without an answer ({})",
                    self.name, outcome.reason
                );
                if let Some(error) = &outcome.error {
                    message.push_str(": ");
                    message.push_str(&error.message);
                }
                tracing::warn!(
                    worker = %self.name,
                    reason = %outcome.reason,
                    "Worker gave no answer"
                );
                Ok(ToolResult::failure(&self.name, kind, message).with_data(details))
            }
        }
    }
}

/// Builds a manager orchestrator over a set of named workers
pub struct Team {
    workers: Vec<WorkerTool>,
    timeout: Duration,
    config: AgentConfig,
}

impl Default for Team {
    fn default() -> Self {
        Self::new()
    }
}

impl Team {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            timeout: DEFAULT_WORKER_TIMEOUT,
            config: AgentConfig {
                prompt: PromptBuilder::new(MANAGER_ROLE),
                ..AgentConfig::default()
            },
        }
    }

    /// Add a worker; `role` tells the manager what the worker is good at
    #[must_use]
    pub fn worker(
        mut self,
        name: impl Into<String>,
        role: impl Into<String>,
        agent: Arc<Orchestrator>,
    ) -> Self {
        self.workers.push(WorkerTool::new(name, role, agent));
        self
    }

    /// Bound on one delegated run
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Manager configuration
    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the manager
    pub fn build_manager(self, adapter: Arc<dyn ModelAdapter>) -> Result<Orchestrator> {
        if self.workers.is_empty() {
            return Err(AgentError::Config("a team needs at least one worker".into()));
        }

        let mut registry = ToolRegistry::new().with_timeout(self.timeout);
        for worker in self.workers {
            registry.register(worker)?;
        }
        Ok(Orchestrator::new(adapter, Arc::new(registry), None, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TerminationReason;
    use crate::step::ModelStep;
    use crate::testing::ScriptedAdapter;
    use crate::tool::{Arguments, CalculatorTool};

    fn analyst(script: ScriptedAdapter) -> Arc<Orchestrator> {
        Arc::new(
            Orchestrator::builder()
                .adapter(Arc::new(script))
                .tool(CalculatorTool)
                .role("You are an analyst. Use the calculator for all arithmetic.")
                .build()
                .unwrap(),
        )
    }

    fn delegate(task: &str) -> ModelStep {
        ModelStep::tool_call(ToolCall::new("analyst", Arguments::new()).with_arg(TASK_ARG, task))
    }

    #[tokio::test]
    async fn test_manager_delegates_to_worker() {
        let worker = analyst(ScriptedAdapter::steps([
            ModelStep::tool_call(
                ToolCall::new("calculator", Arguments::new())
                    .with_arg("expression", "5000 / 62500"),
            ),
            ModelStep::final_answer("0.08"),
        ]));
        let manager_adapter = Arc::new(ScriptedAdapter::steps([
            delegate("How much is 5000 / 62500?"),
            ModelStep::final_answer("You can afford 0.08 BTC."),
        ]));

        let manager = Team::new()
            .worker("analyst", "Performs calculations with a calculator", worker)
            .build_manager(manager_adapter.clone())
            .unwrap();
        assert!(manager.instructions().contains("### analyst"));

        let outcome = manager.ask("Budget 5000, price 62500. How many BTC?").await;
        assert_eq!(outcome.answer.as_deref(), Some("You can afford 0.08 BTC."));

        let result = outcome.transcript.tool_results().next().unwrap();
        assert!(result.success);
        assert_eq!(result.output, "0.08");
        assert!(manager_adapter.requests()[1].messages[2].content.contains("0.08"));
    }

    #[tokio::test]
    async fn test_worker_failure_is_recoverable() {
        // Empty script: the worker's adapter fails on its first turn
        let worker = analyst(ScriptedAdapter::steps([]));
        let manager_adapter = Arc::new(ScriptedAdapter::steps([
            delegate("2 + 2"),
            ModelStep::final_answer("The analyst is unavailable."),
        ]));
        let manager = Team::new()
            .worker("analyst", "Performs calculations", worker)
            .build_manager(manager_adapter)
            .unwrap();

        let outcome = manager.ask("2 + 2?").await;
        assert_eq!(outcome.reason, TerminationReason::Answered);

        let result = outcome.transcript.tool_results().next().unwrap();
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::BackendUnavailable));
        assert!(result.output.contains("fatal_error"));
    }

    #[test]
    fn test_team_requires_workers() {
        let adapter = Arc::new(ScriptedAdapter::steps([]));
        assert!(matches!(Team::new().build_manager(adapter), Err(AgentError::Config(_))));
    }
}
