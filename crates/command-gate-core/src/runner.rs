// crates/command-gate-core/src/runner.rs
// ============================================================================
// Module: Process Runner
// Description: Timed, cancellable execution of external programs.
// Purpose: Turn a blocking process invocation into a classified result.
// Dependencies: async-trait, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`ProcessRunner`] executes an argument vector on a dedicated tokio worker,
//! captures stdout/stderr, enforces an optional timeout, and optionally
//! decodes stdout as JSON. Every invocation yields exactly one
//! [`ExecutionResult`] or exactly one [`CommandError`].
//!
//! ## Invariants
//! - A non-zero exit with `check` enabled is always a failure; stdout is
//!   discarded.
//! - Timeouts and faults carry the exit code sentinel [`FAULT_EXIT_CODE`].
//! - A timed-out child is killed before the failure is reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Output;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::logging::SessionLogger;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Component tag used for runner log lines.
pub const RUNNER_COMPONENT: &str = "cmd_runner";
/// Default invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Exit code reported for timeouts and faults.
pub const FAULT_EXIT_CODE: i32 = -1;
/// Stderr text recorded for timed-out invocations.
pub const TIMEOUT_STDERR: &str = "Command timed out";
/// Maximum characters of raw stdout quoted in decode failures.
const MAX_OUTPUT_PREVIEW_CHARS: usize = 500;

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// A fully resolved process invocation.
///
/// # Invariants
/// - `argv[0]` is the program; an empty `argv` is reported as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Time limit; `None` or zero means no limit.
    pub timeout: Option<Duration>,
    /// Fail on a non-zero exit code.
    pub check: bool,
    /// Decode non-empty stdout as JSON.
    pub parse_json: bool,
    /// Emit an error log line on failure.
    pub log_errors: bool,
    /// Working directory override.
    pub working_dir: Option<PathBuf>,
    /// Environment variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    /// Creates an invocation with the default timeout, `check` enabled, and
    /// JSON decoding disabled.
    #[must_use]
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            timeout: Some(DEFAULT_TIMEOUT),
            check: true,
            parse_json: false,
            log_errors: true,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Sets the time limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether a non-zero exit code is a failure.
    #[must_use]
    pub const fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Sets whether stdout is decoded as JSON.
    #[must_use]
    pub const fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }

    /// Sets whether failures emit an error log line.
    #[must_use]
    pub const fn with_log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = log_errors;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Returns the argument vector joined by spaces.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }

    /// Returns the time limit, treating zero as unlimited.
    #[must_use]
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|limit| !limit.is_zero())
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Captured output of a completed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Raw stdout (lossy UTF-8).
    pub stdout: String,
    /// Raw stderr (lossy UTF-8).
    pub stderr: String,
    /// Decoded stdout when JSON decoding was requested and stdout was non-empty.
    pub structured: Option<Value>,
}

impl ExecutionResult {
    /// Returns true when the process exited with code zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts the result into the value handed back to callers.
    #[must_use]
    pub fn into_output(self) -> CommandOutput {
        match self.structured {
            Some(value) => CommandOutput::Structured(value),
            None => CommandOutput::Text(self.stdout),
        }
    }
}

/// Caller-facing command output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    /// Raw stdout text.
    Text(String),
    /// Decoded JSON value.
    Structured(Value),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Classification of a command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The process exited with a non-zero code while `check` was enabled.
    NonZeroExit,
    /// The time limit elapsed and the process was killed.
    Timeout,
    /// Stdout could not be decoded as JSON.
    MalformedOutput,
    /// Spawn, I/O, or worker failure.
    Fault,
}

impl FailureCause {
    /// Returns a stable label for the cause.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonZeroExit => "non_zero_exit",
            Self::Timeout => "timeout",
            Self::MalformedOutput => "malformed_output",
            Self::Fault => "fault",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A classified command failure, built once at the failure site.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct CommandError {
    /// Failure classification.
    pub cause: FailureCause,
    /// Human-readable diagnosis.
    pub message: String,
    /// Argument vector that failed.
    pub argv: Vec<String>,
    /// Exit code, or [`FAULT_EXIT_CODE`] for timeouts and faults.
    pub exit_code: i32,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandError {
    /// Builds a fault failure for `argv`.
    #[must_use]
    pub fn fault(argv: &[String], detail: &str) -> Self {
        Self {
            cause: FailureCause::Fault,
            message: format!("Unexpected error running command: {} - {detail}", argv.join(" ")),
            argv: argv.to_vec(),
            exit_code: FAULT_EXIT_CODE,
            stderr: detail.to_string(),
        }
    }

    /// Returns true when `needle` appears in the stderr or the message.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.stderr.contains(needle) || self.message.contains(needle)
    }
}

// ============================================================================
// SECTION: Runner Trait
// ============================================================================

/// Executes invocations on behalf of the command builder.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation`, logging through `logger`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for non-zero exits (with `check`), timeouts,
    /// malformed JSON output, and spawn or I/O faults.
    async fn run(
        &self,
        invocation: Invocation,
        logger: &SessionLogger,
    ) -> Result<ExecutionResult, CommandError>;
}

// ============================================================================
// SECTION: Process Runner
// ============================================================================

/// Runner backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a process runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: Invocation,
        logger: &SessionLogger,
    ) -> Result<ExecutionResult, CommandError> {
        let command_line = invocation.command_line();
        logger.debug(RUNNER_COMPONENT, format!("Running command: {command_line}"));
        tracing::debug!(command = %command_line, "spawning command");

        let raw = execute(&invocation).await;
        let result = classify(&invocation, raw);
        match &result {
            Ok(_) => {
                logger.debug(
                    RUNNER_COMPONENT,
                    format!("Command completed successfully: {command_line}"),
                );
            }
            Err(err) => {
                tracing::debug!(cause = err.cause.as_str(), exit_code = err.exit_code, "command failed");
                if invocation.log_errors {
                    logger.error(RUNNER_COMPONENT, failure_log_message(err, &command_line));
                }
            }
        }
        result
    }
}

/// Outcome of the process worker before classification.
enum RawOutcome {
    /// The process exited and its output was captured.
    Completed(Output),
    /// The time limit elapsed.
    TimedOut(Duration),
    /// Spawning or waiting failed.
    Failed(String),
}

/// Aborts the worker task when the calling future is dropped.
struct WorkerGuard(JoinHandle<RawOutcome>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawns the process and waits for it on a separate tokio task.
async fn execute(invocation: &Invocation) -> RawOutcome {
    let Some((program, args)) = invocation.argv.split_first() else {
        return RawOutcome::Failed("empty argument vector".to_string());
    };
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(&invocation.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }
    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return RawOutcome::Failed(err.to_string()),
    };

    let limit = invocation.effective_timeout();
    let mut guard = WorkerGuard(tokio::spawn(async move {
        let wait = child.wait_with_output();
        match limit {
            // Dropping the wait future drops the child, which kills it.
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(Ok(output)) => RawOutcome::Completed(output),
                Ok(Err(err)) => RawOutcome::Failed(err.to_string()),
                Err(_) => RawOutcome::TimedOut(limit),
            },
            None => match wait.await {
                Ok(output) => RawOutcome::Completed(output),
                Err(err) => RawOutcome::Failed(err.to_string()),
            },
        }
    }));
    match (&mut guard.0).await {
        Ok(outcome) => outcome,
        Err(err) => RawOutcome::Failed(format!("command worker join failed: {err}")),
    }
}

/// Maps a raw worker outcome onto the result contract.
fn classify(invocation: &Invocation, raw: RawOutcome) -> Result<ExecutionResult, CommandError> {
    let command_line = invocation.command_line();
    match raw {
        RawOutcome::Failed(detail) => Err(CommandError::fault(&invocation.argv, &detail)),
        RawOutcome::TimedOut(limit) => Err(CommandError {
            cause: FailureCause::Timeout,
            message: format!("Command timed out after {}s: {command_line}", limit.as_secs_f64()),
            argv: invocation.argv.clone(),
            exit_code: FAULT_EXIT_CODE,
            stderr: TIMEOUT_STDERR.to_string(),
        }),
        RawOutcome::Completed(output) => {
            let exit_code = output.status.code().unwrap_or(FAULT_EXIT_CODE);
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if exit_code != 0 && invocation.check {
                let mut message = format!("Command failed with exit code {exit_code}: {command_line}");
                let trimmed = stderr.trim();
                if !trimmed.is_empty() {
                    message.push_str("\nStderr: ");
                    message.push_str(trimmed);
                }
                return Err(CommandError {
                    cause: FailureCause::NonZeroExit,
                    message,
                    argv: invocation.argv.clone(),
                    exit_code,
                    stderr,
                });
            }
            let structured = if invocation.parse_json && !stdout.is_empty() {
                match serde_json::from_str::<Value>(&stdout) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        return Err(CommandError {
                            cause: FailureCause::MalformedOutput,
                            message: format!(
                                "Failed to parse command output as JSON: {err}\nOutput: {}",
                                output_preview(&stdout)
                            ),
                            argv: invocation.argv.clone(),
                            exit_code,
                            stderr,
                        });
                    }
                }
            } else {
                None
            };
            Ok(ExecutionResult {
                exit_code,
                stdout,
                stderr,
                structured,
            })
        }
    }
}

/// Returns at most [`MAX_OUTPUT_PREVIEW_CHARS`] characters of `stdout`.
fn output_preview(stdout: &str) -> String {
    let mut chars = stdout.chars();
    let preview: String = chars.by_ref().take(MAX_OUTPUT_PREVIEW_CHARS).collect();
    if chars.next().is_some() { format!("{preview}...") } else { preview }
}

/// Formats the error log line for a failure.
fn failure_log_message(err: &CommandError, command_line: &str) -> String {
    match err.cause {
        FailureCause::MalformedOutput => format!("{}\nCommand: {command_line}", err.message),
        _ => err.message.clone(),
    }
}
