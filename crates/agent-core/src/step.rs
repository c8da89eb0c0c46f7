//! Model Steps
//!
//! A model response is interpreted as exactly one of three steps: a final
//! answer, a tool call, or a retrieval request. Backends with native function
//! calling hand over an action directly; text-only backends are parsed for a
//! ReAct-style `Action:` line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tool::{Arguments, ToolCall, ToolSchema};

/// Action name that ends the loop with an answer
pub const FINAL_ANSWER_ACTION: &str = "final_answer";

/// Action name that queries the document store
pub const RETRIEVE_ACTION: &str = "retrieve";

/// Argument key for a bare tool input with no single parameter to bind to
pub const UNBOUND_INPUT_KEY: &str = "input";

/// What the model asked for next
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelStep {
    FinalAnswer { answer: String },
    RequestToolCall { call: ToolCall },
    RequestRetrieval { query: String },
}

impl ModelStep {
    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self::FinalAnswer { answer: answer.into() }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::RequestToolCall { call }
    }

    pub fn retrieval(query: impl Into<String>) -> Self {
        Self::RequestRetrieval { query: query.into() }
    }

    /// Build a step from an action name and its input.
    ///
    /// A bare input for a regular tool is bound to that tool's single required
    /// parameter, or to [`UNBOUND_INPUT_KEY`] when there is none.
    pub fn from_action(name: &str, input: Value, tools: &[ToolSchema]) -> Result<Self> {
        match name {
            FINAL_ANSWER_ACTION => Ok(Self::final_answer(text_input(input, "answer"))),
            RETRIEVE_ACTION => {
                let query = text_input(input, "query");
                if query.trim().is_empty() {
                    return Err(AgentError::MalformedResponse("retrieval query is empty".into()));
                }
                Ok(Self::retrieval(query))
            }
            _ => {
                let arguments = match input {
                    Value::Object(map) => map.into_iter().collect::<Arguments>(),
                    Value::Null => Arguments::new(),
                    other => {
                        // Unknown tools and ambiguous schemas are left to the
                        // registry, which reports them as tool errors
                        let key = tools
                            .iter()
                            .find(|t| t.name == name)
                            .and_then(ToolSchema::sole_required_param)
                            .map_or_else(|| UNBOUND_INPUT_KEY.to_string(), |p| p.name.clone());
                        let mut args = Arguments::new();
                        args.insert(key, other);
                        args
                    }
                };
                Ok(Self::tool_call(ToolCall::new(name, arguments)))
            }
        }
    }

    /// Canonical action text recorded as the agent's message
    pub fn render(&self) -> String {
        match self {
            Self::FinalAnswer { answer } => answer.clone(),
            Self::RequestToolCall { call } => action_line(
                &call.name,
                &Value::Object(call.arguments.clone().into_iter().collect()),
            ),
            Self::RequestRetrieval { query } => {
                action_line(RETRIEVE_ACTION, &Value::from(query.as_str()))
            }
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FinalAnswer { .. } => "final_answer",
            Self::RequestToolCall { .. } => "tool_call",
            Self::RequestRetrieval { .. } => "retrieval",
        }
    }
}

fn action_line(name: &str, input: &Value) -> String {
    format!(
        "Action: {}",
        serde_json::json!({ "tool_name": name, "tool_input": input })
    )
}

/// String inputs pass through; objects yield `key` or their JSON text
fn text_input(input: Value, key: &str) -> String {
    match input {
        Value::String(s) => s,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct ActionJson {
    #[serde(alias = "tool", alias = "name")]
    tool_name: String,
    #[serde(default, alias = "arguments", alias = "input")]
    tool_input: Value,
}

/// Parse a text completion into a step
pub fn parse_step(content: &str, tools: &[ToolSchema]) -> Result<ModelStep> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AgentError::MalformedResponse("empty completion".into()));
    }

    // ```tool fenced block
    if let Some(start) = content.find("```tool") {
        let body = &content[start + "```tool".len()..];
        let end = body
            .find("```")
            .ok_or_else(|| AgentError::MalformedResponse("unterminated ```tool block".into()))?;
        return parse_action_json(body[..end].trim(), tools);
    }

    // Action: {...}
    if let Some(start) = find_marker(content, "Action:") {
        let rest = content[start..].trim_start();
        let json = extract_json_object(rest).ok_or_else(|| {
            AgentError::MalformedResponse("Action is not followed by a JSON object".into())
        })?;
        return parse_action_json(json, tools);
    }

    if let Some(start) = find_marker(content, "Final Answer:") {
        return Ok(ModelStep::final_answer(content[start..].trim()));
    }

    // No action requested: the model answered directly
    Ok(ModelStep::final_answer(content))
}

fn parse_action_json(json: &str, tools: &[ToolSchema]) -> Result<ModelStep> {
    let action: ActionJson = serde_json::from_str(json)
        .map_err(|e| AgentError::MalformedResponse(format!("invalid action JSON: {e}")))?;
    ModelStep::from_action(action.tool_name.trim(), action.tool_input, tools)
}

/// Byte offset just past the last occurrence of `marker`
fn find_marker(content: &str, marker: &str) -> Option<usize> {
    content.rfind(marker).map(|i| i + marker.len())
}

/// First balanced `{...}` object in `text`, honouring JSON strings
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{CalculatorTool, Tool};

    fn tools() -> Vec<ToolSchema> {
        vec![CalculatorTool.schema()]
    }

    #[test]
    fn test_react_action_with_string_input() {
        let content = concat!(
            "Thought: I need to add.\n",
            r#"Action: {"tool_name": "calculator", "tool_input": "15 + 27"}"#,
        );
        match parse_step(content, &tools()).unwrap() {
            ModelStep::RequestToolCall { call } => {
                assert_eq!(call.name, "calculator");
                assert_eq!(call.str_arg("expression"), Some("15 + 27"));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_fenced_tool_block() {
        let content = r#"Let me check that for you.
```tool
{"tool": "calculator", "arguments": {"expression": "2 + 2"}}
```"#;
        let step = parse_step(content, &tools()).unwrap();
        assert_eq!(step.kind(), "tool_call");
    }

    #[test]
    fn test_final_answer_action() {
        let content = r#"Thought: done.
Action: {"tool_name": "final_answer", "tool_input": "42"}"#;
        assert_eq!(parse_step(content, &tools()).unwrap(), ModelStep::final_answer("42"));
    }

    #[test]
    fn test_retrieval_action() {
        let content = r#"Action: {"tool_name": "retrieve", "tool_input": {"query": "sky color"}}"#;
        assert_eq!(parse_step(content, &tools()).unwrap(), ModelStep::retrieval("sky color"));
    }

    #[test]
    fn test_plain_text_is_final_answer() {
        assert_eq!(
            parse_step("  The sky is blue.  ", &tools()).unwrap(),
            ModelStep::final_answer("The sky is blue.")
        );
        assert_eq!(
            parse_step("Thought: easy\nFinal Answer: blue", &tools()).unwrap(),
            ModelStep::final_answer("blue")
        );
    }

    #[test]
    fn test_malformed_responses() {
        assert!(matches!(parse_step("   ", &tools()), Err(AgentError::MalformedResponse(_))));
        assert!(matches!(
            parse_step("Action: calculator 2+2", &tools()),
            Err(AgentError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_step("Action: {\"tool_name\": ", &tools()),
            Err(AgentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_bare_input_without_single_parameter() {
        let content = r#"Action: {"tool_name": "weather", "tool_input": "Paris"}"#;
        let step = parse_step(content, &tools()).unwrap();
        match step {
            ModelStep::RequestToolCall { call } => {
                assert_eq!(call.name, "weather");
                assert_eq!(call.str_arg(UNBOUND_INPUT_KEY), Some("Paris"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_json_braces_inside_strings() {
        let content =
            r#"Action: {"tool_name": "final_answer", "tool_input": "use {curly} braces"} trailing"#;
        assert_eq!(
            parse_step(content, &tools()).unwrap(),
            ModelStep::final_answer("use {curly} braces")
        );
    }

    #[test]
    fn test_render_round_trips_through_parser() {
        let step = ModelStep::tool_call(
            ToolCall::new("calculator", Arguments::new()).with_arg("expression", "3*3"),
        );
        let reparsed = parse_step(&step.render(), &tools()).unwrap();
        match reparsed {
            ModelStep::RequestToolCall { call } => {
                assert_eq!(call.str_arg("expression"), Some("3*3"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
