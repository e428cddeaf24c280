// crates/command-gate-mcp/src/tools.rs
// ============================================================================
// Module: Tool Surface
// Description: Tool definitions, request types, and the tool call router.
// Purpose: Compose tracing, approval, and kubectl execution per tool call.
// Dependencies: command-gate-core, serde, serde_json, shell-words, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ToolRouter`] decodes tool parameters, opens a span for every call, and
//! dispatches to the `kubectl`, `base64`, `echo`, and `health_check` tools.
//! The `kubectl` tool passes through the [`ApprovalGate`] before the command
//! runs. User refusals come back as text results, never as errors.
//! Invariants:
//! - Parameter decoding and tokenization failures are raised before any
//!   process is spawned.
//! - Command failures reach the caller unchanged inside [`ToolError::Command`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use command_gate_core::CommandError;
use command_gate_core::CommandOutput;
use command_gate_core::KubectlClient;
use command_gate_core::KubectlRequest;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::approval::ApprovalError;
use crate::approval::ApprovalGate;
use crate::approval::GateOutcome;
use crate::codec;
use crate::codec::Base64Error;
use crate::session::ToolSession;
use crate::telemetry::CallSite;
use crate::telemetry::ReturnLength;
use crate::telemetry::ToolTracer;
use crate::telemetry::TracerOptions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest accepted `repeat` for the echo tool.
pub const MAX_ECHO_REPEAT: u32 = 1000;
/// Characters of echo text quoted in the call log line.
const ECHO_LOG_PREVIEW_CHARS: usize = 50;
/// Component tag for echo log lines.
const ECHO_COMPONENT: &str = "echo";
/// Component tag for health log lines.
const HEALTH_COMPONENT: &str = "health";

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Run a kubectl command.
    Kubectl,
    /// Encode or decode base64.
    Base64,
    /// Echo text back.
    Echo,
    /// Report server health.
    HealthCheck,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kubectl => "kubectl",
            Self::Base64 => "base64",
            Self::Echo => "echo",
            Self::HealthCheck => "health_check",
        }
    }

    /// Returns all tool names in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Kubectl, Self::Base64, Self::Echo, Self::HealthCheck]
    }

    /// Parses a tool name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "kubectl" => Some(Self::Kubectl),
            "base64" => Some(Self::Base64),
            "echo" => Some(Self::Echo),
            "health_check" => Some(Self::HealthCheck),
            _ => None,
        }
    }

    /// Returns the span name for calls to this tool.
    #[must_use]
    pub fn span_name(self) -> String {
        format!("tool.{}", self.as_str())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool definition used by tool listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    pub input_schema: Value,
}

/// Returns the definitions of every tool in canonical order.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all().iter().map(|name| definition(*name)).collect()
}

/// Builds the definition for `name`.
fn definition(name: ToolName) -> ToolDefinition {
    let (description, input_schema) = match name {
        ToolName::Kubectl => (
            "Execute a kubectl command against the cluster. Mutating verbs such as delete, \
             apply, and scale require user confirmation.",
            json!({
                "type": "object",
                "properties": {
                    "cmd": {"type": "string", "description": "kubectl arguments, e.g. 'get pods -A'"},
                    "context": {"type": ["string", "null"], "description": "kubeconfig context"},
                    "namespace": {"type": ["string", "null"], "description": "target namespace"},
                    "output_format": {"type": ["string", "null"], "default": "json"},
                    "timeout": {"type": "number", "minimum": 0, "default": 30.0}
                },
                "required": ["cmd"],
                "additionalProperties": false
            }),
        ),
        ToolName::Base64 => (
            "Encode text to base64 or decode base64 to text.",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "action": {"type": "string", "enum": ["encode", "decode"]},
                    "encoding": {"type": "string", "default": "utf-8"}
                },
                "required": ["text", "action"],
                "additionalProperties": false
            }),
        ),
        ToolName::Echo => (
            "Echo back the input text, optionally repeated.",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "repeat": {"type": "integer", "minimum": 0, "maximum": MAX_ECHO_REPEAT, "default": 1}
                },
                "required": ["text"],
                "additionalProperties": false
            }),
        ),
        ToolName::HealthCheck => (
            "Health check endpoint for container monitoring.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        ),
    };
    ToolDefinition {
        name,
        description: description.to_string(),
        input_schema,
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Parameters of the `kubectl` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubectlToolRequest {
    /// Command arguments as one string.
    pub cmd: String,
    /// Kubeconfig context.
    #[serde(default)]
    pub context: Option<String>,
    /// Target namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Output format; null or empty disables `--output`.
    #[serde(default = "default_output_format")]
    pub output_format: Option<String>,
    /// Timeout in seconds; zero means no limit.
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// Parameters of the `base64` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Base64ToolRequest {
    /// Input text.
    pub text: String,
    /// `encode` or `decode`.
    pub action: String,
    /// Text encoding name.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

/// Parameters of the `echo` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EchoToolRequest {
    /// Text to echo.
    pub text: String,
    /// Number of repetitions.
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// Parameters of the `health_check` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckRequest {}

/// Default kubectl output format.
fn default_output_format() -> Option<String> {
    Some(command_gate_core::kubectl::DEFAULT_OUTPUT_FORMAT.to_string())
}

/// Default base64 text encoding.
fn default_encoding() -> String {
    "utf-8".to_string()
}

/// Default echo repetitions.
const fn default_repeat() -> u32 {
    1
}

// ============================================================================
// SECTION: Outputs and Errors
// ============================================================================

/// Tool call result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// Text result.
    Text(String),
    /// Structured result.
    Structured(Value),
}

impl ToolOutput {
    /// Returns the text when the output is textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Converts the output into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Structured(value) => value,
        }
    }
}

impl From<CommandOutput> for ToolOutput {
    fn from(output: CommandOutput) -> Self {
        match output {
            CommandOutput::Text(text) => Self::Text(text),
            CommandOutput::Structured(value) => Self::Structured(value),
        }
    }
}

impl ReturnLength for ToolOutput {
    fn return_length(&self) -> usize {
        match self {
            Self::Text(text) => text.return_length(),
            Self::Structured(value) => value.return_length(),
        }
    }
}

/// Tool routing errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool")]
    UnknownTool,
    /// Tool input failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// The command failed.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The confirmation channel failed.
    #[error("confirmation failed: {0}")]
    Confirmation(String),
    /// Tool payload serialization failed.
    #[error("serialization failure")]
    Serialization,
    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidParams(_) => "invalid_params",
            Self::Command(_) => "command_failed",
            Self::Confirmation(_) => "confirmation_failed",
            Self::Serialization => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the JSON-RPC error code for the transport.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::UnknownTool => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Command(_) => -32010,
            Self::Confirmation(_) => -32011,
            Self::Serialization => -32060,
            Self::Internal(_) => -32050,
        }
    }
}

impl From<Base64Error> for ToolError {
    fn from(error: Base64Error) -> Self {
        Self::InvalidParams(error.to_string())
    }
}

impl From<ApprovalError> for ToolError {
    fn from(error: ApprovalError) -> Self {
        Self::Confirmation(error.to_string())
    }
}

// ============================================================================
// SECTION: Command Tokenizer
// ============================================================================

/// Splits a command string into words with POSIX shell quoting rules.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for an empty command or an
/// unterminated quote.
pub fn split_command(cmd: &str) -> Result<Vec<String>, ToolError> {
    let words = shell_words::split(cmd).map_err(|err| {
        ToolError::InvalidParams(format!("cmd is not a valid command line: {err}"))
    })?;
    if words.is_empty() {
        return Err(ToolError::InvalidParams("cmd must not be empty".to_string()));
    }
    Ok(words)
}

/// Converts a timeout in seconds into a duration.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for negative or non-finite values.
pub fn timeout_from_secs(secs: f64) -> Result<Duration, ToolError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ToolError::InvalidParams("timeout must be a non-negative number of seconds".to_string())
    })
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Settings the router needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ToolRouterSettings {
    /// Server name reported by the health check.
    pub server_name: String,
    /// Timeout applied when a kubectl call omits one.
    pub default_timeout: Duration,
    /// Span recording options for tool calls.
    pub tracer_options: TracerOptions,
}

/// Routes tool calls.
#[derive(Clone)]
pub struct ToolRouter {
    /// Kubectl command client.
    kubectl: KubectlClient,
    /// Confirmation gate for mutating verbs.
    gate: ApprovalGate,
    /// Call interceptor.
    tracer: ToolTracer,
    /// Router settings.
    settings: ToolRouterSettings,
}

impl ToolRouter {
    /// Creates a router.
    #[must_use]
    pub const fn new(
        kubectl: KubectlClient,
        gate: ApprovalGate,
        tracer: ToolTracer,
        settings: ToolRouterSettings,
    ) -> Self {
        Self {
            kubectl,
            gate,
            tracer,
            settings,
        }
    }

    /// Lists tool definitions.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handles a tool call by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the tool is unknown, the parameters are
    /// invalid, or the tool fails.
    pub async fn handle_tool_call(
        &self,
        session: &ToolSession,
        name: &str,
        params: Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        tracing::debug!(tool = tool.as_str(), "tool call");
        match tool {
            ToolName::Kubectl => {
                let mut request: KubectlToolRequest = decode(params)?;
                if request.timeout.is_none() {
                    request.timeout = Some(self.settings.default_timeout.as_secs_f64());
                }
                let args = bound_args(&request)?;
                let span_name = tool.span_name();
                let call = self.call_site(session, tool, &span_name, &args);
                self.tracer.instrument(call, self.kubectl(session, &request)).await
            }
            ToolName::Base64 => {
                let request: Base64ToolRequest = decode(params)?;
                let args = bound_args(&request)?;
                let span_name = tool.span_name();
                self.tracer.instrument_sync(self.call_site(session, tool, &span_name, &args), || {
                    codec::transform(&request.text, &request.action, &request.encoding)
                        .map(ToolOutput::Text)
                        .map_err(ToolError::from)
                })
            }
            ToolName::Echo => {
                let request: EchoToolRequest = decode(params)?;
                let args = bound_args(&request)?;
                let span_name = tool.span_name();
                self.tracer.instrument_sync(self.call_site(session, tool, &span_name, &args), || {
                    echo(session, &request)
                })
            }
            ToolName::HealthCheck => {
                let request: HealthCheckRequest = decode(params)?;
                let args = bound_args(&request)?;
                let span_name = tool.span_name();
                self.tracer.instrument_sync(self.call_site(session, tool, &span_name, &args), || {
                    health_check(session, &self.settings.server_name)
                })
            }
        }
    }

    /// Describes a call for the tracer.
    fn call_site<'a>(
        &'a self,
        session: &'a ToolSession,
        tool: ToolName,
        span_name: &'a str,
        args: &'a Map<String, Value>,
    ) -> CallSite<'a> {
        CallSite {
            span_name,
            function_name: tool.as_str(),
            options: &self.settings.tracer_options,
            args,
            context: Some(&session.context),
        }
    }

    /// Runs the kubectl tool.
    async fn kubectl(
        &self,
        session: &ToolSession,
        request: &KubectlToolRequest,
    ) -> Result<ToolOutput, ToolError> {
        let args = split_command(&request.cmd)?;
        let timeout = request
            .timeout
            .map_or(Ok(self.settings.default_timeout), timeout_from_secs)?;
        let kubectl_request = KubectlRequest::new(args)
            .with_context(request.context.clone())
            .with_namespace(request.namespace.clone())
            .with_output_format(request.output_format.clone())
            .with_timeout(Some(timeout));
        let command = self.kubectl.build(&kubectl_request);
        let outcome = self
            .gate
            .evaluate(
                &command.argv,
                kubectl_request.verb(),
                session.confirmation.as_ref(),
                &session.logger,
            )
            .await?;
        if let GateOutcome::Refused(refusal) = outcome {
            return Ok(ToolOutput::Text(refusal.message().to_string()));
        }
        let result = self.kubectl.run(&kubectl_request, &session.logger).await?;
        Ok(result.into_output().into())
    }
}

// ============================================================================
// SECTION: Simple Tools
// ============================================================================

/// Runs the echo tool.
fn echo(session: &ToolSession, request: &EchoToolRequest) -> Result<ToolOutput, ToolError> {
    if request.repeat > MAX_ECHO_REPEAT {
        return Err(ToolError::InvalidParams(format!(
            "repeat must be between 0 and {MAX_ECHO_REPEAT}"
        )));
    }
    let preview: String = request.text.chars().take(ECHO_LOG_PREVIEW_CHARS).collect();
    session.logger.info(
        ECHO_COMPONENT,
        format!("Echo called with text='{preview}...', repeat={}", request.repeat),
    );
    session.logger.debug(ECHO_COMPONENT, format!("Generated {} repetitions", request.repeat));
    let repeat = usize::try_from(request.repeat).map_err(|err| ToolError::Internal(err.to_string()))?;
    Ok(ToolOutput::Text(vec![request.text.as_str(); repeat].join("\n")))
}

/// Runs the health check tool.
fn health_check(session: &ToolSession, server_name: &str) -> Result<ToolOutput, ToolError> {
    session.logger.info(HEALTH_COMPONENT, "Health check requested");
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let info = json!({
        "status": "healthy",
        "timestamp": timestamp,
        "platform": std::env::consts::OS,
        "version": env!("CARGO_PKG_VERSION"),
        "server": server_name,
    });
    Ok(ToolOutput::Text(format!("Server is healthy: {info}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes tool parameters; a missing payload is an empty object.
fn decode<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    let params = if params.is_null() { Value::Object(Map::new()) } else { params };
    serde_json::from_value(params).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Serializes a decoded request into the bound argument map.
fn bound_args<T: Serialize>(request: &T) -> Result<Map<String, Value>, ToolError> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(ToolError::Serialization),
    }
}

#[cfg(test)]
mod tests;
