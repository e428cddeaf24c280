// crates/command-gate-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared runners, sessions, and gateways for gateway tests.
// Purpose: Drive the gateway without spawning kubectl.
// Dependencies: command-gate-core, command-gate-mcp
// ============================================================================

//! ## Overview
//! A scripted [`CommandRunner`] replays canned results and records every
//! invocation so tests can assert what would have been spawned.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use command_gate_core::CommandError;
use command_gate_core::CommandRunner;
use command_gate_core::ExecutionResult;
use command_gate_core::FailureCause;
use command_gate_core::Invocation;
use command_gate_core::MemoryLogSink;
use command_gate_core::SessionLogger;
use command_gate_mcp::ConfirmationDecision;
use command_gate_mcp::GatewayConfig;
use command_gate_mcp::McpGateway;
use command_gate_mcp::RequestContext;
use command_gate_mcp::SpanExporterKind;
use command_gate_mcp::StaticConfirmation;
use command_gate_mcp::ToolSession;
use serde_json::Value;

// ============================================================================
// SECTION: Scripted Runner
// ============================================================================

/// Runner that replays canned outcomes in order and records invocations.
#[derive(Default)]
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<Result<ExecutionResult, CommandError>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<Result<ExecutionResult, CommandError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().map(|call| call.argv).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: Invocation,
        _logger: &SessionLogger,
    ) -> Result<ExecutionResult, CommandError> {
        self.calls.lock().unwrap().push(invocation);
        self.outcomes.lock().unwrap().pop_front().expect("unexpected invocation")
    }
}

pub fn text(stdout: &str) -> Result<ExecutionResult, CommandError> {
    Ok(ExecutionResult {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        structured: None,
    })
}

pub fn structured(value: Value) -> Result<ExecutionResult, CommandError> {
    Ok(ExecutionResult {
        exit_code: 0,
        stdout: value.to_string(),
        stderr: String::new(),
        structured: Some(value),
    })
}

pub fn failure(cause: FailureCause, exit_code: i32, stderr: &str) -> CommandError {
    CommandError {
        cause,
        message: format!("Command failed with exit code {exit_code}"),
        argv: vec!["kubectl".to_string()],
        exit_code,
        stderr: stderr.to_string(),
    }
}

// ============================================================================
// SECTION: Gateway and Sessions
// ============================================================================

/// Builds a gateway recording spans in memory.
pub fn gateway(runner: &Arc<ScriptedRunner>, approval_required: bool) -> McpGateway {
    let mut config = GatewayConfig::default();
    config.approval.required = approval_required;
    config.telemetry.exporter = SpanExporterKind::Memory;
    McpGateway::with_runner(config, runner.clone()).unwrap()
}

/// A session answering every prompt with `decision`, logging into memory.
pub struct TestSession {
    pub session: ToolSession,
    pub provider: Arc<StaticConfirmation>,
    pub logs: Arc<MemoryLogSink>,
}

pub fn session(decision: ConfirmationDecision) -> TestSession {
    let provider = Arc::new(StaticConfirmation::new(decision));
    let logs = Arc::new(MemoryLogSink::new());
    let context = RequestContext {
        request_id: Some("req-1".to_string()),
        session_id: Some("session-1".to_string()),
        client: Some("integration".to_string()),
        protocol_version: None,
    };
    let session = ToolSession::new(context, SessionLogger::new(logs.clone()), provider.clone());
    TestSession {
        session,
        provider,
        logs,
    }
}
