// crates/command-gate-core/src/cluster/tests.rs
// ============================================================================
// Module: Cluster Query Unit Tests
// Description: Unit tests for context, cluster-info, and namespace queries.
// Purpose: Validate argument shapes and output decoding for read-only lookups.
// Dependencies: command-gate-core
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
use serde_json::json;

use super::*;
use crate::runner::CommandRunner;
use crate::runner::ExecutionResult;

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

    fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().iter().map(|call| call.argv.clone()).collect()
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

fn text(stdout: &str) -> Result<ExecutionResult, CommandError> {
    Ok(ExecutionResult {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        structured: None,
    })
}

fn structured(value: Value) -> Result<ExecutionResult, CommandError> {
    Ok(ExecutionResult {
        exit_code: 0,
        stdout: value.to_string(),
        stderr: String::new(),
        structured: Some(value),
    })
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

// ============================================================================
// SECTION: Current Context
// ============================================================================

#[tokio::test]
async fn current_context_is_trimmed_and_unchecked() {
    let runner = ScriptedRunner::new(vec![text("prod\n")]);
    let client = KubectlClient::new(runner.clone());
    let context = client.current_context(&SessionLogger::disabled()).await;
    assert_eq!(context.as_deref(), Some("prod"));

    let calls = runner.calls.lock().unwrap().clone();
    assert_eq!(calls[0].argv, strings(&["kubectl", "config", "current-context"]));
    assert!(!calls[0].check);
    assert!(!calls[0].log_errors);
}

#[tokio::test]
async fn current_context_is_none_when_blank_or_failed() {
    let runner = ScriptedRunner::new(vec![
        text("  \n"),
        Err(CommandError::fault(&strings(&["kubectl"]), "No such file or directory")),
    ]);
    let client = KubectlClient::new(runner);
    assert_eq!(client.current_context(&SessionLogger::disabled()).await, None);
    assert_eq!(client.current_context(&SessionLogger::disabled()).await, None);
}

// ============================================================================
// SECTION: Cluster Info
// ============================================================================

#[tokio::test]
async fn cluster_info_runs_both_commands_without_output_flag() {
    let runner = ScriptedRunner::new(vec![
        text("Kubernetes control plane is running\n"),
        text("Client Version: v1.30.0\n"),
    ]);
    let client = KubectlClient::new(runner.clone());
    let info = client.cluster_info(Some("prod"), &SessionLogger::disabled()).await.unwrap();
    assert_eq!(
        info,
        ClusterInfo {
            cluster_info: "Kubernetes control plane is running\n".to_string(),
            version_info: "Client Version: v1.30.0\n".to_string(),
            context: "prod".to_string(),
        }
    );
    assert_eq!(
        runner.argvs(),
        vec![
            strings(&["kubectl", "cluster-info", "--context", "prod"]),
            strings(&["kubectl", "version", "--context", "prod"]),
        ]
    );
}

#[tokio::test]
async fn cluster_info_stops_at_first_failure() {
    let failure = CommandError {
        cause: FailureCause::NonZeroExit,
        message: "Command failed with exit code 1: kubectl cluster-info".to_string(),
        argv: strings(&["kubectl", "cluster-info"]),
        exit_code: 1,
        stderr: "connection refused".to_string(),
    };
    let runner = ScriptedRunner::new(vec![Err(failure.clone())]);
    let client = KubectlClient::new(runner.clone());
    let err = client.cluster_info(None, &SessionLogger::disabled()).await.unwrap_err();
    assert_eq!(err, failure);
    assert_eq!(runner.argvs().len(), 1);
}

// ============================================================================
// SECTION: Namespaces
// ============================================================================

#[tokio::test]
async fn namespaces_decode_items_in_order() {
    let runner = ScriptedRunner::new(vec![structured(json!({
        "kind": "List",
        "items": [
            {
                "metadata": {"name": "default", "creationTimestamp": "2024-01-01T00:00:00Z"},
                "status": {"phase": "Active"}
            },
            {"metadata": {"name": "kube-system"}}
        ]
    }))]);
    let client = KubectlClient::new(runner.clone());
    let response = client.namespaces(None, &SessionLogger::disabled()).await.unwrap();

    assert_eq!(response.total_count, 2);
    assert_eq!(response.context, "default");
    assert_eq!(response.namespaces[0].name(), "default");
    assert_eq!(response.namespaces[0].creation_timestamp(), Some("2024-01-01T00:00:00Z"));
    assert_eq!(response.namespaces[0].phase(), Some("Active"));
    assert_eq!(response.namespaces[1].name(), "kube-system");
    assert_eq!(response.namespaces[1].phase(), None);
    assert_eq!(
        runner.argvs(),
        vec![strings(&["kubectl", "get", "namespaces", "--output", "json"])]
    );
}

#[tokio::test]
async fn namespaces_without_json_are_malformed() {
    let runner = ScriptedRunner::new(vec![text("")]);
    let client = KubectlClient::new(runner);
    let err = client.namespaces(Some("dev"), &SessionLogger::disabled()).await.unwrap_err();
    assert_eq!(err.cause, FailureCause::MalformedOutput);
    assert_eq!(
        err.argv,
        strings(&["kubectl", "get", "namespaces", "--context", "dev", "--output", "json"])
    );
}
