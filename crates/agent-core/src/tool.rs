//! Tool System
//!
//! Tools are registered with a typed argument schema and invoked by the
//! reasoning loop. Arguments are validated against the schema before any
//! handler runs, and every invocation is bounded by the registry timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, ErrorKind, Result};
use crate::step::{FINAL_ANSWER_ACTION, RETRIEVE_ACTION};

/// Tool arguments keyed by parameter name
pub type Arguments = HashMap<String, Value>;

/// Default per-invocation timeout
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

fn new_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tool call request from the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool", alias = "tool_name")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Arguments,

    /// Call ID used to pair the result with this request
    #[serde(default = "new_call_id")]
    pub id: String,

    /// Ordinal of the agent message that requested the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: new_call_id(),
            ordinal: None,
        }
    }

    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// String argument lookup
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// ID of the originating call
    #[serde(default)]
    pub call_id: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error tag when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            call_id: String::new(),
            success: false,
            output: error.into(),
            data: None,
            error: Some(kind),
        }
    }

    /// Error-tagged result for a failed call
    pub fn from_error(call: &ToolCall, err: &AgentError) -> Self {
        Self::failure(&call.name, err.kind(), err.to_string()).with_id(&call.id)
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.call_id = id.into();
        self
    }
}

/// JSON type tag of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Whether a JSON value has this type
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// Expected JSON type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema (shown to the model)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Ordered parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            category: None,
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The only required parameter, if there is exactly one.
    ///
    /// Used to bind a bare string `tool_input` to a named argument.
    pub fn sole_required_param(&self) -> Option<&ParameterSchema> {
        let mut required = self.parameters.iter().filter(|p| p.required);
        let first = required.next()?;
        required.next().is_none().then_some(first)
    }

    /// Check arguments against the schema and fill in defaults
    pub fn validate(&self, arguments: &Arguments) -> Result<Arguments> {
        for key in arguments.keys() {
            if !self.parameters.iter().any(|p| &p.name == key) {
                return Err(AgentError::InvalidArguments(format!(
                    "unexpected argument '{key}' for tool '{}'",
                    self.name
                )));
            }
        }

        let mut normalized = arguments.clone();
        for param in &self.parameters {
            match arguments.get(&param.name) {
                Some(value) => {
                    if !param.param_type.accepts(value) {
                        return Err(AgentError::InvalidArguments(format!(
                            "argument '{}' must be of type {}, got {value}",
                            param.name, param.param_type
                        )));
                    }
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            return Err(AgentError::InvalidArguments(format!(
                                "argument '{}' must be one of {}",
                                param.name,
                                Value::Array(allowed.clone())
                            )));
                        }
                    }
                }
                None if param.required => {
                    return Err(AgentError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        param.name
                    )));
                }
                None => {
                    if let Some(default) = &param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(normalized)
    }

    /// JSON Schema object for backends with native function calling
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::from(param.param_type.as_str()));
            prop.insert("description".into(), Value::from(param.description.clone()));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }
        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already-validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Pure handler registered through [`ToolRegistry::register_fn`]
pub type Handler = Arc<dyn Fn(&Arguments) -> Result<Value> + Send + Sync>;

/// Adapts a pure function into a [`Tool`].
///
/// The handler runs on the blocking pool so the invocation timeout also
/// bounds CPU-bound work.
struct FnTool {
    schema: ToolSchema,
    handler: Handler,
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let handler = Arc::clone(&self.handler);
        let arguments = call.arguments.clone();
        let value = tokio::task::spawn_blocking(move || handler(&arguments))
            .await
            .map_err(|e| AgentError::ToolExecution(e.to_string()))??;

        let output = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(ToolResult::success(&self.schema.name, output).with_data(value))
    }
}

struct Registered {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Registered>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Per-invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if schema.name == FINAL_ANSWER_ACTION || schema.name == RETRIEVE_ACTION {
            return Err(AgentError::Config(format!(
                "'{}' is a reserved action name",
                schema.name
            )));
        }
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::Config(format!(
                "tool '{}' is already registered",
                schema.name
            )));
        }
        tracing::debug!(tool = %schema.name, "Registered tool");
        self.tools.insert(schema.name.clone(), Registered { schema, tool });
        Ok(())
    }

    /// Register a pure function as a tool
    pub fn register_fn<F>(&mut self, schema: ToolSchema, handler: F) -> Result<()>
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(FnTool {
            schema,
            handler: Arc::new(handler),
        })
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|r| Arc::clone(&r.tool))
    }

    /// Execute a tool call, surfacing failures as errors
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let entry = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

        // Validate first; the handler never sees bad arguments
        let arguments = entry.schema.validate(&call.arguments)?;
        let call = ToolCall {
            arguments,
            ..call.clone()
        };

        let outcome = tokio::time::timeout(self.timeout, entry.tool.execute(&call))
            .await
            .map_err(|_| AgentError::ToolTimeout {
                tool: call.name.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        let mut result = outcome.with_id(&call.id);
        result.name.clone_from(&call.name);
        if !result.success && result.error.is_none() {
            result.error = Some(ErrorKind::ToolExecution);
        }
        Ok(result)
    }

    /// Execute a tool call; failures become error-tagged results
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        match self.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool invocation failed");
                ToolResult::from_error(call, &e)
            }
        }
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|r| r.schema.clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registry restricted to the named tools
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut subset = Self::new().with_timeout(self.timeout);
        for name in names {
            let name = name.as_ref();
            let tool = self
                .get(name)
                .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
            subset.register_arc(tool)?;
        }
        Ok(subset)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Calculator tool - evaluates arithmetic expressions
pub struct CalculatorTool;

impl CalculatorTool {
    pub const NAME: &'static str = "calculator";
}

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            Self::NAME,
            "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, \
             sqrt, abs, ln, log, exp, pi and e.",
        )
        .param(ParameterSchema::required(
            "expression",
            ParamType::String,
            "Expression to evaluate (e.g., '2 + 2', '(3 + 4) * 5')",
        ))
        .category("math")
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let expr = call
            .str_arg("expression")
            .ok_or_else(|| AgentError::InvalidArguments("missing expression".into()))?;

        let value = evaluate_expression(expr)?;
        Ok(ToolResult::success(Self::NAME, format_number(value))
            .with_data(serde_json::json!(value)))
    }
}

/// Render integral values without a fractional part
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate_expression(expr: &str) -> Result<f64> {
    let mut parser = ExprParser::new(expr);
    let value = parser.expression()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(AgentError::Evaluation(format!(
            "unexpected '{c}' at position {}",
            parser.pos
        )));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AgentError::Evaluation(format!("result is not finite: {value}")))
    }
}

/// Deepest nesting the calculator accepts
const MAX_EXPRESSION_DEPTH: usize = 128;

/// Recursive-descent parser: expression > term > unary > power > primary
struct ExprParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err(AgentError::Evaluation("division by zero".into()));
                }
                value /= rhs;
            } else if self.eat('%') {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err(AgentError::Evaluation("modulo by zero".into()));
                }
                value %= rhs;
            } else {
                return Ok(value);
            }
        }
    }

    // Every nested parenthesis, function argument, exponent and sign passes
    // through here, so this bounds the recursion depth
    fn unary(&mut self) -> Result<f64> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(AgentError::Evaluation("expression nested too deeply".into()));
        }
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    // Right-associative: 2^3^2 == 2^9
    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.expression()?;
                if !self.eat(')') {
                    return Err(AgentError::Evaluation("missing closing parenthesis".into()));
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.identifier(),
            Some(c) => Err(AgentError::Evaluation(format!(
                "unexpected '{c}' at position {}",
                self.pos
            ))),
            None => Err(AgentError::Evaluation("unexpected end of expression".into())),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        // Scientific notation: 1e3, 2.5E-4
        if matches!(self.peek(), Some('e' | 'E'))
            && self
                .chars
                .get(self.pos + 1)
                .is_some_and(|c| c.is_ascii_digit() || *c == '-' || *c == '+')
        {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| AgentError::Evaluation(format!("invalid number '{literal}'")))
    }

    fn identifier(&mut self) -> Result<f64> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect::<String>().to_lowercase();

        match name.as_str() {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        let func: fn(f64) -> f64 = match name.as_str() {
            "sqrt" => f64::sqrt,
            "abs" => f64::abs,
            "ln" => f64::ln,
            "log" => f64::log10,
            "exp" => f64::exp,
            _ => return Err(AgentError::Evaluation(format!("unknown identifier '{name}'"))),
        };
        if !self.eat('(') {
            return Err(AgentError::Evaluation(format!("expected '(' after {name}")));
        }
        let arg = self.expression()?;
        if !self.eat(')') {
            return Err(AgentError::Evaluation("missing closing parenthesis".into()));
        }
        Ok(func(arg))
    }
}
