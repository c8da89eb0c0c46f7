//! Scripted adapter for tests
//!
//! Replays a fixed sequence of responses and records every request it sees.
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{BackendIdentity, Completion, ModelAdapter, NativeAction, StepRequest};
use crate::step::{ModelStep, RETRIEVE_ACTION};

/// One scripted backend response
#[derive(Debug)]
pub enum Scripted {
    /// Raw text, parsed like any text-only backend
    Text(String),
    /// A step delivered as a native action
    Step(ModelStep),
    /// A backend failure
    Error(AgentError),
}

/// What the adapter was asked
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub instructions: String,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Adapter that answers from a script
#[derive(Debug)]
pub struct ScriptedAdapter {
    identity: BackendIdentity,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedAdapter {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            identity: BackendIdentity {
                kind: "scripted".into(),
                model: "scripted-model".into(),
                endpoint: "memory://".into(),
            },
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script made only of text responses
    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(|t| Scripted::Text(t.into())))
    }

    /// Script made only of steps
    pub fn steps(steps: impl IntoIterator<Item = ModelStep>) -> Self {
        Self::new(steps.into_iter().map(Scripted::Step))
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &StepRequest<'_>) -> Result<Completion> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                instructions: request.instructions.to_string(),
                messages: request.conversation.to_vec(),
                tools: request.tools.iter().map(|t| t.name.clone()).collect(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| AgentError::BackendUnavailable("script exhausted".into()))?;

        match next {
            Scripted::Text(text) => Ok(Completion::text(text)),
            Scripted::Step(ModelStep::FinalAnswer { answer }) => Ok(Completion::text(answer)),
            Scripted::Step(ModelStep::RequestToolCall { call }) => Ok(Completion {
                action: Some(NativeAction {
                    name: call.name,
                    input: Value::Object(call.arguments.into_iter().collect()),
                }),
                ..Default::default()
            }),
            Scripted::Step(ModelStep::RequestRetrieval { query }) => Ok(Completion {
                action: Some(NativeAction {
                    name: RETRIEVE_ACTION.into(),
                    input: Value::String(query),
                }),
                ..Default::default()
            }),
            Scripted::Error(err) => Err(err),
        }
    }
}
