// crates/command-gate-mcp/src/tools/tests.rs
// ============================================================================
// Module: Tool Surface Unit Tests
// Description: Unit tests for tool routing, approval wiring, and simple tools.
// Purpose: Validate that refusals never reach the runner and faults keep their shape.
// Dependencies: command-gate-core, command-gate-mcp
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use command_gate_core::CommandRunner;
use command_gate_core::ExecutionResult;
use command_gate_core::FailureCause;
use command_gate_core::Invocation;
use command_gate_core::MemoryLogSink;
use command_gate_core::SessionLogger;

use super::*;
use crate::approval::ConfirmationDecision;
use crate::approval::StaticConfirmation;
use crate::session::RequestContext;
use crate::telemetry::InMemorySpanExporter;
use crate::telemetry::SpanStatus;

// ============================================================================
// SECTION: Test Fixtures
// ============================================================================

/// Runner that replays canned outcomes and records invocations.
struct ScriptedRunner {
    outcomes: Mutex<VecDeque<Result<ExecutionResult, CommandError>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    fn new(outcomes: Vec<Result<ExecutionResult, CommandError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
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

fn stdout(text: &str, structured: Option<Value>) -> Result<ExecutionResult, CommandError> {
    Ok(ExecutionResult {
        exit_code: 0,
        stdout: text.to_string(),
        stderr: String::new(),
        structured,
    })
}

fn router(runner: &Arc<ScriptedRunner>, required: bool) -> (ToolRouter, Arc<InMemorySpanExporter>) {
    let exporter = Arc::new(InMemorySpanExporter::new());
    let router = ToolRouter::new(
        KubectlClient::new(runner.clone()),
        ApprovalGate::new(required, true),
        ToolTracer::new(exporter.clone(), "test-server"),
        ToolRouterSettings {
            server_name: "test-server".to_string(),
            default_timeout: Duration::from_secs(30),
            tracer_options: TracerOptions::default(),
        },
    );
    (router, exporter)
}

fn session(decision: ConfirmationDecision) -> (ToolSession, Arc<StaticConfirmation>, Arc<MemoryLogSink>) {
    let provider = Arc::new(StaticConfirmation::new(decision));
    let sink = Arc::new(MemoryLogSink::new());
    let session = ToolSession::new(
        RequestContext::default(),
        SessionLogger::new(sink.clone()),
        provider.clone(),
    );
    (session, provider, sink)
}

const APPROVE: ConfirmationDecision = ConfirmationDecision::Accepted {
    proceed: true,
};

// ============================================================================
// SECTION: Names and Definitions
// ============================================================================

#[test]
fn tool_names_parse_their_canonical_form() {
    for name in ToolName::all() {
        assert_eq!(ToolName::parse(name.as_str()), Some(*name));
        assert_eq!(name.to_string(), name.as_str());
    }
    assert_eq!(ToolName::parse("Kubectl"), None);
    assert_eq!(ToolName::HealthCheck.span_name(), "tool.health_check");
}

#[test]
fn definitions_cover_every_tool() {
    let definitions = tool_definitions();
    let names: Vec<ToolName> = definitions.iter().map(|definition| definition.name).collect();
    assert_eq!(names, ToolName::all());
    assert_eq!(definitions[0].input_schema["required"], json!(["cmd"]));
    assert_eq!(definitions[2].input_schema["properties"]["repeat"]["maximum"], json!(1000));
}

// ============================================================================
// SECTION: Tokenizer
// ============================================================================

#[test]
fn commands_split_on_whitespace_and_honor_quotes() {
    assert_eq!(split_command("  get   pods -A ").unwrap(), vec!["get", "pods", "-A"]);
    assert_eq!(
        split_command("get pods -l 'app=web tier'").unwrap(),
        vec!["get", "pods", "-l", "app=web tier"]
    );
    assert_eq!(
        split_command(r#"annotate pod web note="say \"hi\"""#).unwrap(),
        vec!["annotate", "pod", "web", r#"note=say "hi""#]
    );
    assert_eq!(split_command("get pods ''").unwrap(), vec!["get", "pods", ""]);
    assert_eq!(split_command(r"get a\ b").unwrap(), vec!["get", "a b"]);
}

#[test]
fn empty_or_unbalanced_commands_are_invalid() {
    assert!(matches!(split_command("   "), Err(ToolError::InvalidParams(_))));
    assert!(matches!(split_command("get pods -l 'app=web"), Err(ToolError::InvalidParams(_))));
    assert!(matches!(split_command("get \"pods"), Err(ToolError::InvalidParams(_))));
    let err = split_command("get pods -l 'app=web").unwrap_err();
    assert!(err.to_string().contains("cmd is not a valid command line"));
}

#[test]
fn timeouts_must_be_finite_and_non_negative() {
    assert_eq!(timeout_from_secs(1.5).unwrap(), Duration::from_millis(1500));
    assert_eq!(timeout_from_secs(0.0).unwrap(), Duration::ZERO);
    assert!(timeout_from_secs(-1.0).is_err());
    assert!(timeout_from_secs(f64::NAN).is_err());
}

// ============================================================================
// SECTION: Kubectl Tool
// ============================================================================

#[tokio::test]
async fn read_only_command_runs_with_json_output() {
    let pods = json!({"items": [{"metadata": {"name": "web-0"}}]});
    let runner = ScriptedRunner::new(vec![stdout(&pods.to_string(), Some(pods.clone()))]);
    let (router, exporter) = router(&runner, true);
    let (session, provider, _) = session(APPROVE);

    let output = router
        .handle_tool_call(&session, "kubectl", json!({"cmd": "get pods", "namespace": "web"}))
        .await
        .unwrap();
    assert_eq!(output, ToolOutput::Structured(pods));
    assert!(provider.prompts().is_empty());

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].argv, vec!["kubectl", "get", "pods", "--namespace", "web", "--output", "json"]);
    assert_eq!(calls[0].timeout, Some(Duration::from_secs(30)));
    assert!(calls[0].parse_json);

    let span = exporter.last_named("tool.kubectl").unwrap();
    assert_eq!(span.status, SpanStatus::Ok);
    assert_eq!(span.str_attribute("mcp.tool.arg.cmd"), Some("get pods"));
    assert_eq!(span.str_attribute("mcp.tool.arg.timeout"), Some("30.0"));
}

#[tokio::test]
async fn refusals_never_reach_the_runner() {
    let cases = [
        (ConfirmationDecision::Accepted { proceed: false }, "rejected by user"),
        (ConfirmationDecision::Declined, "declined by user"),
        (ConfirmationDecision::Cancelled, "cancelled by user"),
    ];
    for (decision, expected) in cases {
        let runner = ScriptedRunner::new(Vec::new());
        let (router, exporter) = router(&runner, true);
        let (session, provider, _) = session(decision);
        let output = router
            .handle_tool_call(&session, "kubectl", json!({"cmd": "delete pod web-0"}))
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Text(expected.to_string()));
        assert!(runner.calls().is_empty());
        assert_eq!(provider.prompts().len(), 1);
        assert_eq!(exporter.last_named("tool.kubectl").unwrap().status, SpanStatus::Ok);
    }
}

#[tokio::test]
async fn approved_mutation_runs_the_exact_prompted_command() {
    let runner = ScriptedRunner::new(vec![stdout("deployment.apps/web scaled\n", None)]);
    let (router, _) = router(&runner, true);
    let (session, provider, _) = session(APPROVE);
    let output = router
        .handle_tool_call(
            &session,
            "kubectl",
            json!({"cmd": "kubectl scale deploy/web --replicas 0", "context": "prod", "output_format": null}),
        )
        .await
        .unwrap();
    assert_eq!(output.as_text(), Some("deployment.apps/web scaled\n"));
    let prompt = &provider.prompts()[0];
    assert_eq!(prompt.verb, "scale");
    assert_eq!(runner.calls()[0].argv, prompt.argv);
    assert_eq!(
        prompt.argv,
        vec!["kubectl", "scale", "deploy/web", "--replicas", "0", "--context", "prod"]
    );
}

#[tokio::test]
async fn disabled_gate_runs_mutations_without_asking() {
    let runner = ScriptedRunner::new(vec![stdout("namespace \"web\" deleted\n", None)]);
    let (router, _) = router(&runner, false);
    let (session, provider, _) = session(ConfirmationDecision::Cancelled);
    let output = router
        .handle_tool_call(&session, "kubectl", json!({"cmd": "delete ns web", "output_format": ""}))
        .await
        .unwrap();
    assert_eq!(output.as_text(), Some("namespace \"web\" deleted\n"));
    assert!(provider.prompts().is_empty());
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn missing_confirmation_channel_is_an_error() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, _) = router(&runner, true);
    let err = router
        .handle_tool_call(&ToolSession::detached(), "kubectl", json!({"cmd": "drain node-1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Confirmation(_)));
    assert_eq!(err.kind(), "confirmation_failed");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn command_failures_are_carried_unchanged() {
    let failure = CommandError {
        cause: FailureCause::NonZeroExit,
        message: "Command failed with exit code 1: kubectl get pods --output json".to_string(),
        argv: vec!["kubectl".to_string(), "get".to_string(), "pods".to_string()],
        exit_code: 1,
        stderr: "error: the server doesn't have a resource type \"pods\"".to_string(),
    };
    let runner = ScriptedRunner::new(vec![Err(failure.clone())]);
    let (router, exporter) = router(&runner, true);
    let (session, _, _) = session(APPROVE);
    let err = router.handle_tool_call(&session, "kubectl", json!({"cmd": "get pods"})).await.unwrap_err();
    let ToolError::Command(carried) = &err else {
        panic!("expected command failure, got {err:?}");
    };
    assert_eq!(carried, &failure);
    assert_eq!(err.to_string(), failure.message);
    let span = exporter.last_named("tool.kubectl").unwrap();
    assert_eq!(span.event_names(), vec!["start", "exception", "finish"]);
}

#[tokio::test]
async fn explicit_timeout_reaches_the_runner() {
    let runner = ScriptedRunner::new(vec![stdout("", None)]);
    let (router, _) = router(&runner, true);
    let (session, _, _) = session(APPROVE);
    router
        .handle_tool_call(&session, "kubectl", json!({"cmd": "get ns", "timeout": 2.5}))
        .await
        .unwrap();
    assert_eq!(runner.calls()[0].timeout, Some(Duration::from_millis(2500)));
}

#[tokio::test]
async fn validation_faults_are_raised_before_spawning() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, exporter) = router(&runner, true);
    let (session, _, _) = session(APPROVE);

    let err = router.handle_tool_call(&session, "kubectl", json!({"namespace": "web"})).await.unwrap_err();
    assert_eq!(err.code(), -32602);
    let err = router
        .handle_tool_call(&session, "kubectl", json!({"cmd": "get pods", "verbose": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
    assert!(exporter.spans().is_empty());

    let err = router.handle_tool_call(&session, "kubectl", json!({"cmd": "  "})).await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
    let err = router
        .handle_tool_call(&session, "kubectl", json!({"cmd": "get pods", "timeout": -1.0}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
    assert_eq!(exporter.spans().len(), 2);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn unknown_tools_are_rejected() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, exporter) = router(&runner, true);
    let err = router.handle_tool_call(&ToolSession::detached(), "helm", json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::UnknownTool));
    assert_eq!(err.code(), -32601);
    assert!(exporter.spans().is_empty());
}

// ============================================================================
// SECTION: Simple Tools
// ============================================================================

#[tokio::test]
async fn echo_repeats_and_logs() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, exporter) = router(&runner, true);
    let (session, _, sink) = session(APPROVE);

    let output = router.handle_tool_call(&session, "echo", json!({"text": "hi", "repeat": 3})).await.unwrap();
    assert_eq!(output.as_text(), Some("hi\nhi\nhi"));
    assert_eq!(
        sink.rendered(),
        vec![
            "[echo] Echo called with text='hi...', repeat=3".to_string(),
            "[echo] Generated 3 repetitions".to_string(),
        ]
    );
    let span = exporter.last_named("tool.echo").unwrap();
    assert_eq!(span.attribute("mcp.tool.return_length"), Some(&json!(8)));

    let output = router.handle_tool_call(&session, "echo", json!({"text": "hi", "repeat": 0})).await.unwrap();
    assert_eq!(output.as_text(), Some(""));
    let output = router.handle_tool_call(&session, "echo", json!({"text": "once"})).await.unwrap();
    assert_eq!(output.as_text(), Some("once"));
}

#[tokio::test]
async fn echo_log_preview_is_limited() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, _) = router(&runner, true);
    let (session, _, sink) = session(APPROVE);
    let text = "x".repeat(80);
    router.handle_tool_call(&session, "echo", json!({"text": text})).await.unwrap();
    let expected = format!("[echo] Echo called with text='{}...', repeat=1", "x".repeat(50));
    assert_eq!(sink.rendered()[0], expected);
}

#[tokio::test]
async fn echo_rejects_excessive_repeats() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, exporter) = router(&runner, true);
    let (session, _, sink) = session(APPROVE);
    let err = router
        .handle_tool_call(&session, "echo", json!({"text": "hi", "repeat": 1001}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
    assert!(sink.records().is_empty());
    assert!(matches!(exporter.last_named("tool.echo").unwrap().status, SpanStatus::Error { .. }));
}

#[tokio::test]
async fn health_check_reports_status_and_server() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, _) = router(&runner, true);
    let (session, _, sink) = session(APPROVE);
    let output = router.handle_tool_call(&session, "health_check", Value::Null).await.unwrap();
    let text = output.as_text().unwrap();
    let info: Value = serde_json::from_str(text.strip_prefix("Server is healthy: ").unwrap()).unwrap();
    assert_eq!(info["status"], "healthy");
    assert_eq!(info["server"], "test-server");
    assert_eq!(info["platform"], std::env::consts::OS);
    assert!(info["timestamp"].as_f64().unwrap() > 0.0);
    assert_eq!(sink.rendered(), vec!["[health] Health check requested".to_string()]);
}

#[tokio::test]
async fn base64_tool_encodes_and_reports_faults() {
    let runner = ScriptedRunner::new(Vec::new());
    let (router, _) = router(&runner, true);
    let session = ToolSession::detached();
    let output = router
        .handle_tool_call(&session, "base64", json!({"text": "Hello World", "action": "encode"}))
        .await
        .unwrap();
    assert_eq!(output.as_text(), Some("SGVsbG8gV29ybGQ="));

    let err = router
        .handle_tool_call(&session, "base64", json!({"text": "x", "action": "zip"}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid parameters: Invalid action 'zip'. Must be 'encode' or 'decode'");
}
