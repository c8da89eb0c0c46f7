//! Instruction Preamble
//!
//! Renders the role definition, the action protocol, the tool catalogue and
//! worked examples into the text every adapter sends ahead of the conversation.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::step::{FINAL_ANSWER_ACTION, RETRIEVE_ACTION};
use crate::tool::ToolSchema;

const DEFAULT_ROLE: &str = "You are a helpful AI assistant. \
    You reason step by step and use tools when they help you answer accurately.";

/// Builds the instruction preamble for an agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBuilder {
    /// Who the agent is
    pub role_definition: String,

    /// Extra formatting rules appended after the protocol
    #[serde(default)]
    pub format_instructions: Vec<String>,

    /// Worked examples of the protocol
    #[serde(default)]
    pub examples: Vec<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROLE)
    }
}

impl PromptBuilder {
    pub fn new(role_definition: impl Into<String>) -> Self {
        Self {
            role_definition: role_definition.into(),
            format_instructions: Vec::new(),
            examples: Vec::new(),
        }
    }

    #[must_use]
    pub fn format_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.format_instructions.push(instruction.into());
        self
    }

    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Render the full preamble
    pub fn render(&self, tools: &[ToolSchema], retrieval: bool) -> String {
        let mut prompt = self.role_definition.trim().to_string();

        prompt.push_str("\n\n## Response Format\n\n");
        prompt.push_str("Think briefly, then respond with exactly one action on its own line:\n\n");
        prompt.push_str("Thought: <your reasoning>\n");
        prompt.push_str("Action: ");
        prompt.push_str(r#"{"tool_name": "<name>", "tool_input": <JSON object or string>}"#);
        prompt.push_str("\n\n");
        let _ = writeln!(
            prompt,
            "Use `{FINAL_ANSWER_ACTION}` with the answer text as `tool_input` when you are done."
        );
        if retrieval {
            let _ = writeln!(
                prompt,
                "Use `{RETRIEVE_ACTION}` with a search query as `tool_input` to look up passages \
                 from the document library. Cite the sources you use."
            );
        }
        prompt.push_str(
            "After each action you will receive an Observation. \
             If it reports an error, correct your input and try again.\n",
        );

        for instruction in &self.format_instructions {
            prompt.push('\n');
            prompt.push_str(instruction.trim());
            prompt.push('\n');
        }

        if !tools.is_empty() {
            prompt.push('\n');
            prompt.push_str(&tool_section(tools));
        }

        if !self.examples.is_empty() {
            prompt.push_str("\n## Examples\n");
            for example in &self.examples {
                prompt.push('\n');
                prompt.push_str(example.trim());
                prompt.push('\n');
            }
        }

        prompt
    }
}

/// Markdown section describing available tools
pub fn tool_section(tools: &[ToolSchema]) -> String {
    let mut section = String::from("## Available Tools\n\n");

    for schema in tools {
        let _ = writeln!(section, "### {}", schema.name);
        let _ = writeln!(section, "{}", schema.description);

        if !schema.parameters.is_empty() {
            section.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                let _ = writeln!(
                    section,
                    "- `{}` ({}){}: {}",
                    param.name, param.param_type, required, param.description
                );
            }
        }
        section.push('\n');
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{CalculatorTool, Tool};

    #[test]
    fn test_render_lists_tools_and_protocol() {
        let prompt = PromptBuilder::new("You are a calculator.")
            .example("User: 2+2\nAction: {\"tool_name\": \"calculator\", \"tool_input\": \"2+2\"}")
            .render(&[CalculatorTool.schema()], false);

        assert!(prompt.starts_with("You are a calculator."));
        assert!(prompt.contains("### calculator"));
        assert!(prompt.contains("`expression` (string) (required)"));
        assert!(prompt.contains("final_answer"));
        assert!(!prompt.contains("`retrieve`"));
        assert!(prompt.contains("## Examples"));
    }

    #[test]
    fn test_render_mentions_retrieval_when_enabled() {
        let prompt = PromptBuilder::default().render(&[], true);
        assert!(prompt.contains("`retrieve`"));
        assert!(!prompt.contains("## Available Tools"));
    }
}
