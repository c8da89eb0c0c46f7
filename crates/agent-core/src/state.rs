//! Run State
//!
//! Per-run state of the orchestrator: the conversation, the turn budget, the
//! current phase of the state machine and the audit transcript. A fresh
//! [`AgentState`] is created for every run and never shared.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, ErrorKind};
use crate::message::{Conversation, Message};
use crate::retrieval::Passage;
use crate::step::ModelStep;
use crate::tool::{ToolCall, ToolResult};

/// Why a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Answered,
    TurnLimit,
    FatalError,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Answered => "answered",
            Self::TurnLimit => "turn_limit",
            Self::FatalError => "fatal_error",
        })
    }
}

/// Error that ended a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AgentError> for RunError {
    fn from(err: &AgentError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Terminal payload of the state machine
#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    Answered(String),
    TurnLimit,
    Fatal(RunError),
}

/// State machine phases
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    AwaitingModel,
    AwaitingTool(ToolCall),
    AwaitingRetrieval(String),
    Done(Termination),
}

impl Phase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::AwaitingTool(_) => "awaiting_tool",
            Self::AwaitingRetrieval(_) => "awaiting_retrieval",
            Self::Done(_) => "done",
        }
    }

    /// Whether the machine may move from `self` to `next`
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (
                Self::AwaitingModel,
                Self::Done(_) | Self::AwaitingTool(_) | Self::AwaitingRetrieval(_)
            ) | (Self::AwaitingTool(_) | Self::AwaitingRetrieval(_), Self::AwaitingModel)
        )
    }
}

/// One auditable thing that happened during a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// The model chose a step; `ordinal` is the agent message recording it
    Step {
        turn: usize,
        ordinal: usize,
        step: ModelStep,
    },
    /// A tool call finished; `ordinal` is the tool message carrying it
    ToolResult { ordinal: usize, result: ToolResult },
    /// A retrieval finished (or failed)
    Retrieval {
        ordinal: usize,
        query: String,
        passages: Vec<Passage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RunError>,
    },
    /// The adapter failed and the run stopped
    Failure { turn: usize, error: RunError },
}

/// Full record of a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub messages: Vec<Message>,
    pub events: Vec<TranscriptEvent>,
}

impl Transcript {
    /// Tool calls in request order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.events.iter().filter_map(|e| match e {
            TranscriptEvent::Step {
                step: ModelStep::RequestToolCall { call },
                ..
            } => Some(call),
            _ => None,
        })
    }

    /// Tool results in completion order
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.events.iter().filter_map(|e| match e {
            TranscriptEvent::ToolResult { result, .. } => Some(result),
            _ => None,
        })
    }
}

/// What a caller gets back from a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Final answer (only when `reason` is `Answered`)
    pub answer: Option<String>,
    pub reason: TerminationReason,
    /// Model turns consumed
    pub turns: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub transcript: Transcript,
}

impl RunOutcome {
    pub const fn is_answered(&self) -> bool {
        matches!(self.reason, TerminationReason::Answered)
    }
}

/// Mutable state owned by a single run
#[derive(Debug)]
pub struct AgentState {
    pub conversation: Conversation,
    turn: usize,
    max_turns: usize,
    phase: Phase,
    events: Vec<TranscriptEvent>,
}

impl AgentState {
    pub fn new(conversation: Conversation, max_turns: usize) -> Self {
        Self {
            conversation,
            turn: 0,
            max_turns,
            phase: Phase::AwaitingModel,
            events: Vec::new(),
        }
    }

    pub const fn turn(&self) -> usize {
        self.turn
    }

    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Consume one turn of the budget; `false` once the budget is spent
    pub fn begin_turn(&mut self) -> bool {
        if self.turn >= self.max_turns {
            return false;
        }
        self.turn += 1;
        true
    }

    /// Take the current phase, leaving the machine parked in `AwaitingModel`
    /// until [`transition`](Self::transition) installs the next one.
    pub fn take_phase(&mut self) -> Phase {
        std::mem::replace(&mut self.phase, Phase::AwaitingModel)
    }

    /// Install the next phase
    pub fn transition(&mut self, from: &Phase, next: Phase) {
        debug_assert!(
            from.can_transition_to(&next),
            "illegal transition {} -> {}",
            from.name(),
            next.name()
        );
        tracing::trace!(from = from.name(), to = next.name(), turn = self.turn, "Phase transition");
        self.phase = next;
    }

    pub fn record(&mut self, event: TranscriptEvent) {
        self.events.push(event);
    }

    /// Finish the run
    pub fn into_outcome(self, termination: Termination) -> RunOutcome {
        let (answer, reason, error) = match termination {
            Termination::Answered(answer) => (Some(answer), TerminationReason::Answered, None),
            Termination::TurnLimit => (None, TerminationReason::TurnLimit, None),
            Termination::Fatal(error) => (None, TerminationReason::FatalError, Some(error)),
        };
        RunOutcome {
            answer,
            reason,
            turns: self.turn,
            error,
            transcript: Transcript {
                messages: self.conversation.into_messages(),
                events: self.events,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Arguments;

    #[test]
    fn test_turn_budget_is_bounded() {
        let mut state = AgentState::new(Conversation::new(), 2);
        assert!(state.begin_turn());
        assert!(state.begin_turn());
        assert!(!state.begin_turn());
        assert_eq!(state.turn(), 2);
    }

    #[test]
    fn test_legal_transitions() {
        let call = ToolCall::new("calculator", Arguments::new());
        assert!(Phase::AwaitingModel.can_transition_to(&Phase::AwaitingTool(call.clone())));
        assert!(Phase::AwaitingModel.can_transition_to(&Phase::Done(Termination::TurnLimit)));
        assert!(Phase::AwaitingTool(call.clone()).can_transition_to(&Phase::AwaitingModel));
        assert!(Phase::AwaitingRetrieval("q".into()).can_transition_to(&Phase::AwaitingModel));

        assert!(!Phase::AwaitingTool(call).can_transition_to(&Phase::Done(Termination::TurnLimit)));
        assert!(!Phase::AwaitingModel.can_transition_to(&Phase::AwaitingModel));
        assert!(!Phase::Done(Termination::TurnLimit).can_transition_to(&Phase::AwaitingModel));
    }

    #[test]
    fn test_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&TerminationReason::TurnLimit).unwrap(),
            "\"turn_limit\""
        );
        assert_eq!(
            serde_json::to_string(&TerminationReason::FatalError).unwrap(),
            "\"fatal_error\""
        );
    }
}
