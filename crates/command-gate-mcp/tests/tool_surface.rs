// crates/command-gate-mcp/tests/tool_surface.rs
// ============================================================================
// Module: Tool Surface Tests
// Description: End-to-end tool and resource calls through the gateway.
// Purpose: Ensure results, faults, and spans keep their documented shapes.
// Dependencies: command-gate-core, command-gate-mcp
// ============================================================================

//! ## Overview
//! Exercises every tool and resource through [`McpGateway`] with scripted
//! kubectl results.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

mod common;

use command_gate_core::FailureCause;
use command_gate_mcp::ConfirmationDecision;
use command_gate_mcp::ResourceContent;
use command_gate_mcp::ResourceError;
use command_gate_mcp::SpanStatus;
use command_gate_mcp::ToolError;
use command_gate_mcp::ToolName;
use command_gate_mcp::ToolOutput;
use serde_json::json;

use crate::common::ScriptedRunner;
use crate::common::failure;
use crate::common::gateway;
use crate::common::session;
use crate::common::structured;
use crate::common::text;

const APPROVE: ConfirmationDecision = ConfirmationDecision::Accepted {
    proceed: true,
};

#[test]
fn listing_reports_tools_and_resources() {
    let runner = ScriptedRunner::new(Vec::new());
    let gateway = gateway(&runner, true);
    let tools: Vec<ToolName> = gateway.list_tools().iter().map(|tool| tool.name).collect();
    assert_eq!(tools, vec![ToolName::Kubectl, ToolName::Base64, ToolName::Echo, ToolName::HealthCheck]);
    let resources: Vec<&str> = gateway.list_resources().iter().map(|resource| resource.uri).collect();
    assert_eq!(
        resources,
        vec!["kubectl://contexts", "kubectl://cluster-info/{context}", "kubectl://namespaces/{context}"]
    );
}

#[tokio::test]
async fn json_output_is_returned_structured() {
    let pods = json!({"kind": "List", "items": []});
    let runner = ScriptedRunner::new(vec![structured(pods.clone())]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let output = gateway
        .call_tool(&test.session, "kubectl", json!({"cmd": "kubectl get pods -A"}))
        .await
        .unwrap();
    assert_eq!(output.into_value(), pods);
    assert_eq!(runner.argvs()[0], vec!["kubectl", "get", "pods", "-A", "--output", "json"]);
}

#[tokio::test]
async fn caller_output_flag_is_not_duplicated() {
    let runner = ScriptedRunner::new(vec![text("NAME   READY\nweb-0  1/1\n")]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let output = gateway
        .call_tool(&test.session, "kubectl", json!({"cmd": "get pods -o wide"}))
        .await
        .unwrap();
    assert_eq!(output, ToolOutput::Text("NAME   READY\nweb-0  1/1\n".to_string()));
    let calls = runner.calls();
    assert_eq!(calls[0].argv, vec!["kubectl", "get", "pods", "-o", "wide"]);
    assert!(!calls[0].parse_json);
}

#[tokio::test]
async fn rejected_output_flag_is_retried_without_it() {
    let runner = ScriptedRunner::new(vec![
        Err(failure(FailureCause::NonZeroExit, 1, "error: unknown flag: --output")),
        text("Client Version: v1.31.0\n"),
    ]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let output = gateway
        .call_tool(&test.session, "kubectl", json!({"cmd": "version --client"}))
        .await
        .unwrap();
    assert_eq!(output.as_text(), Some("Client Version: v1.31.0\n"));
    assert_eq!(
        runner.argvs(),
        vec![
            vec!["kubectl", "version", "--client", "--output", "json"],
            vec!["kubectl", "version", "--client"],
        ]
    );
}

#[tokio::test]
async fn timeouts_surface_as_command_failures() {
    let runner = ScriptedRunner::new(vec![Err(failure(FailureCause::Timeout, -1, "Command timed out"))]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let err = gateway
        .call_tool(&test.session, "kubectl", json!({"cmd": "get pods", "timeout": 0.5}))
        .await
        .unwrap_err();
    let ToolError::Command(failure) = err else {
        panic!("expected command failure");
    };
    assert_eq!(failure.cause, FailureCause::Timeout);
    assert_eq!(failure.exit_code, -1);
    let span = &gateway.recorded_spans()[0];
    assert!(matches!(span.status, SpanStatus::Error { .. }));
    assert_eq!(span.str_attribute("mcp.tool.arg.timeout"), Some("0.5"));
}

#[tokio::test]
async fn simple_tools_round_trip() {
    let runner = ScriptedRunner::new(Vec::new());
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);

    let encoded = gateway
        .call_tool(&test.session, "base64", json!({"text": "Hello World", "action": "encode"}))
        .await
        .unwrap();
    assert_eq!(encoded.as_text(), Some("SGVsbG8gV29ybGQ="));
    let decoded = gateway
        .call_tool(&test.session, "base64", json!({"text": "SGVsbG8gV29ybGQ=", "action": "decode"}))
        .await
        .unwrap();
    assert_eq!(decoded.as_text(), Some("Hello World"));

    let echoed = gateway.call_tool(&test.session, "echo", json!({"text": "a", "repeat": 2})).await.unwrap();
    assert_eq!(echoed.as_text(), Some("a\na"));

    let health = gateway.call_tool(&test.session, "health_check", json!({})).await.unwrap();
    assert!(health.as_text().unwrap().starts_with("Server is healthy: {"));
    assert!(runner.calls().is_empty());

    let names: Vec<String> = gateway.recorded_spans().into_iter().map(|span| span.name).collect();
    assert_eq!(names, vec!["tool.base64", "tool.base64", "tool.echo", "tool.health_check"]);
}

#[tokio::test]
async fn faults_map_to_stable_codes() {
    let runner = ScriptedRunner::new(Vec::new());
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let unknown = gateway.call_tool(&test.session, "exec", json!({})).await.unwrap_err();
    assert_eq!((unknown.kind(), unknown.code()), ("unknown_tool", -32601));
    let invalid = gateway
        .call_tool(&test.session, "base64", json!({"text": "x", "action": "encode", "encoding": "klingon"}))
        .await
        .unwrap_err();
    assert_eq!((invalid.kind(), invalid.code()), ("invalid_params", -32602));
    assert_eq!(invalid.to_string(), "invalid parameters: Unknown encoding 'klingon'");
}

#[tokio::test]
async fn namespaces_resource_reads_through_kubectl() {
    let listing = json!({"items": [{"metadata": {"name": "kube-system", "creationTimestamp": "2024-01-01T00:00:00Z"}}]});
    let runner = ScriptedRunner::new(vec![structured(listing)]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let content = gateway.read_resource(&test.session, "kubectl://namespaces/default").await.unwrap();
    let ResourceContent::Namespaces(response) = content else {
        panic!("expected namespaces");
    };
    assert_eq!(response.context, "default");
    assert_eq!(response.namespaces[0].name(), "kube-system");
    assert_eq!(response.namespaces[0].creation_timestamp(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(runner.argvs()[0], vec!["kubectl", "get", "namespaces", "--output", "json"]);
}

#[tokio::test]
async fn resource_faults_are_payloads_but_bad_uris_are_errors() {
    let runner = ScriptedRunner::new(vec![Err(failure(FailureCause::NonZeroExit, 1, "forbidden"))]);
    let gateway = gateway(&runner, true);
    let test = session(APPROVE);
    let content = gateway.read_resource(&test.session, "kubectl://cluster-info/lab").await.unwrap();
    assert_eq!(
        content.to_value()["error"],
        "Error getting cluster info for context 'lab': Command failed with exit code 1"
    );
    let err = gateway.read_resource(&test.session, "kubectl://logs/lab").await.unwrap_err();
    assert!(matches!(err, ResourceError::UnknownResource(_)));
}
