// crates/command-gate-mcp/src/lib.rs
// ============================================================================
// Module: Command Gate MCP
// Description: Tool and resource surface for the kubectl command gateway.
// Purpose: Gate, trace, and route tool calls onto the kubectl execution layer.
// Dependencies: async-trait, base64, command-gate-core, regex, serde, tokio, tracing
// ============================================================================

//! ## Overview
//! [`McpGateway`] exposes four tools (`kubectl`, `base64`, `echo`,
//! `health_check`) and three `kubectl://` resources. Each call is wrapped in a
//! span with redacted argument attributes, and mutating kubectl verbs wait on
//! the session's [`ConfirmationProvider`] before anything runs.
//! Invariants:
//! - A refused command never reaches the runner.
//! - Tracing never changes a call's result or error.
//! - The approval switch is configuration, never process-global state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod approval;
pub mod codec;
pub mod config;
pub mod resources;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use approval::ApprovalError;
pub use approval::ApprovalGate;
pub use approval::ConfirmationDecision;
pub use approval::ConfirmationPrompt;
pub use approval::ConfirmationProvider;
pub use approval::GateOutcome;
pub use approval::Refusal;
pub use approval::StaticConfirmation;
pub use approval::UnavailableConfirmation;
pub use codec::Base64Error;
pub use codec::TextEncoding;
pub use config::ConfigError;
pub use config::GatewayConfig;
pub use config::LogSinkKind;
pub use config::SpanExporterKind;
pub use resources::ErrorResponse;
pub use resources::ResourceContent;
pub use resources::ResourceDefinition;
pub use resources::ResourceError;
pub use server::McpGateway;
pub use server::session_logger;
pub use session::RequestContext;
pub use session::ToolSession;
pub use telemetry::InMemorySpanExporter;
pub use telemetry::SpanExporter;
pub use telemetry::SpanRecord;
pub use telemetry::SpanStatus;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolOutput;
