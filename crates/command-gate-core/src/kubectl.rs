// crates/command-gate-core/src/kubectl.rs
// ============================================================================
// Module: Kubectl Command Builder
// Description: Compose kubectl argument vectors from typed requests.
// Purpose: Apply context, namespace, and output flags with one flag fallback.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`KubectlClient`] turns a [`KubectlRequest`] into a concrete argument
//! vector and runs it through a [`CommandRunner`]. When the executable
//! rejects `--output`, the client retries exactly once without the flag.
//!
//! ## Invariants
//! - The argument vector always starts with the configured program.
//! - `--output` is never appended when the caller already supplied `-o` or
//!   `--output`.
//! - The `--output` fallback is the only automatic retry and never recurses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::logging::SessionLogger;
use crate::runner::CommandError;
use crate::runner::CommandRunner;
use crate::runner::DEFAULT_TIMEOUT;
use crate::runner::ExecutionResult;
use crate::runner::Invocation;
use crate::runner::RUNNER_COMPONENT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default kubectl executable name.
pub const KUBECTL_PROGRAM: &str = "kubectl";
/// Default output format requested from kubectl.
pub const DEFAULT_OUTPUT_FORMAT: &str = "json";
/// Output format that enables JSON decoding by default.
const JSON_OUTPUT_FORMAT: &str = "json";
/// kubectl global flags whose value is the next argument.
const VALUE_FLAGS: [&str; 29] = [
    "-n",
    "--namespace",
    "--context",
    "--cluster",
    "--user",
    "--kubeconfig",
    "--kuberc",
    "-s",
    "--server",
    "--token",
    "--as",
    "--as-group",
    "--as-uid",
    "--username",
    "--password",
    "--request-timeout",
    "--cache-dir",
    "--certificate-authority",
    "--client-certificate",
    "--client-key",
    "--tls-server-name",
    "--profile",
    "--profile-output",
    "-v",
    "--v",
    "--vmodule",
    "--log-dir",
    "--log-file",
    "--stderrthreshold",
];
/// Error text emitted by kubectl subcommands without `--output`.
pub const UNKNOWN_OUTPUT_FLAG: &str = "unknown flag: --output";

// ============================================================================
// SECTION: Request
// ============================================================================

/// Typed description of a kubectl call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlRequest {
    /// Verb and arguments, without the program (a leading `kubectl` is tolerated).
    pub args: Vec<String>,
    /// Kubeconfig context to target.
    pub context: Option<String>,
    /// Namespace to target.
    pub namespace: Option<String>,
    /// Output format hint; `None` or empty disables the `--output` flag.
    pub output_format: Option<String>,
    /// Explicit JSON decoding override.
    pub parse_json: Option<bool>,
    /// Time limit; `None` or zero means no limit.
    pub timeout: Option<Duration>,
}

impl KubectlRequest {
    /// Creates a request with JSON output and the default timeout.
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            context: None,
            namespace: None,
            output_format: Some(DEFAULT_OUTPUT_FORMAT.to_string()),
            parse_json: None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Sets the context.
    #[must_use]
    pub fn with_context(mut self, context: Option<impl Into<String>>) -> Self {
        self.context = context.map(Into::into);
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<impl Into<String>>) -> Self {
        self.namespace = namespace.map(Into::into);
        self
    }

    /// Sets the output format hint.
    #[must_use]
    pub fn with_output_format(mut self, output_format: Option<impl Into<String>>) -> Self {
        self.output_format = output_format.map(Into::into);
        self
    }

    /// Forces JSON decoding on or off.
    #[must_use]
    pub const fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = Some(parse_json);
        self
    }

    /// Sets the time limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the verb: the first argument after an optional leading
    /// `kubectl` that is neither a flag nor the value of a global flag.
    #[must_use]
    pub fn verb(&self) -> Option<&str> {
        let args = match self.args.first() {
            Some(first) if first == KUBECTL_PROGRAM => &self.args[1..],
            _ => &self.args[..],
        };
        let mut args = args.iter().map(String::as_str);
        while let Some(arg) = args.next() {
            if VALUE_FLAGS.contains(&arg) {
                args.next();
            } else if !arg.starts_with('-') {
                return Some(arg);
            }
        }
        None
    }
}

// ============================================================================
// SECTION: Built Command
// ============================================================================

/// A resolved kubectl argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlCommand {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Whether stdout should be decoded as JSON.
    pub parse_json: bool,
    /// Position of the appended `--output` flag, when one was appended.
    output_flag_index: Option<usize>,
}

impl KubectlCommand {
    /// Returns true when the builder appended `--output <format>`.
    #[must_use]
    pub const fn appended_output_flag(&self) -> bool {
        self.output_flag_index.is_some()
    }

    /// Returns the argument vector with the appended `--output <format>`
    /// pair removed.
    #[must_use]
    pub fn argv_without_output(&self) -> Vec<String> {
        let Some(index) = self.output_flag_index else {
            return self.argv.clone();
        };
        self.argv
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != index && *position != index + 1)
            .map(|(_, arg)| arg.clone())
            .collect()
    }
}

/// Returns true when any argument starts with `-o` or `--output`.
#[must_use]
pub fn has_output_flag(args: &[String]) -> bool {
    args.iter().any(|arg| arg.starts_with("-o") || arg.starts_with("--output"))
}

/// Extracts the value of a caller-supplied output flag, if any.
fn user_output_format(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" || arg == "--output" {
            return iter.next().map(String::as_str);
        }
        if let Some(value) = arg.strip_prefix("--output=") {
            return Some(value);
        }
        if let Some(value) = arg.strip_prefix("-o") {
            return Some(value.strip_prefix('=').unwrap_or(value));
        }
    }
    None
}

/// Builds the argument vector for `request` using `program`.
#[must_use]
pub fn build_command(program: &str, request: &KubectlRequest) -> KubectlCommand {
    let args = match request.args.first() {
        Some(first) if first == program || first == KUBECTL_PROGRAM => &request.args[1..],
        _ => &request.args[..],
    };
    let mut argv = Vec::with_capacity(args.len() + 7);
    argv.push(program.to_string());
    argv.extend(args.iter().cloned());

    if let Some(context) = request.context.as_deref().filter(|value| !value.is_empty()) {
        argv.push("--context".to_string());
        argv.push(context.to_string());
    }
    if let Some(namespace) = request.namespace.as_deref().filter(|value| !value.is_empty()) {
        argv.push("--namespace".to_string());
        argv.push(namespace.to_string());
    }

    let format = request.output_format.as_deref().filter(|value| !value.is_empty());
    let caller_flag = has_output_flag(args);
    let mut output_flag_index = None;
    if let Some(format) = format
        && !caller_flag
    {
        output_flag_index = Some(argv.len());
        argv.push("--output".to_string());
        argv.push(format.to_string());
    }

    let default_parse = format == Some(JSON_OUTPUT_FORMAT)
        && (!caller_flag || user_output_format(args) == Some(JSON_OUTPUT_FORMAT));
    KubectlCommand {
        argv,
        parse_json: request.parse_json.unwrap_or(default_parse),
        output_flag_index,
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Runs kubectl requests through a [`CommandRunner`].
#[derive(Clone)]
pub struct KubectlClient {
    /// Runner used for every invocation.
    runner: Arc<dyn CommandRunner>,
    /// Executable placed at `argv[0]`.
    program: String,
}

impl KubectlClient {
    /// Creates a client for the default `kubectl` program.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: KUBECTL_PROGRAM.to_string(),
        }
    }

    /// Returns a copy that invokes `program` instead of `kubectl`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the configured program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the runner shared by this client.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Builds the argument vector for `request`.
    #[must_use]
    pub fn build(&self, request: &KubectlRequest) -> KubectlCommand {
        build_command(&self.program, request)
    }

    /// Runs `request`, retrying once without `--output` when kubectl rejects
    /// the flag.
    ///
    /// # Errors
    ///
    /// Returns the [`CommandError`] of the final attempt.
    pub async fn run(
        &self,
        request: &KubectlRequest,
        logger: &SessionLogger,
    ) -> Result<ExecutionResult, CommandError> {
        let command = self.build(request);
        let invocation = Invocation::new(command.argv.clone())
            .with_timeout(request.timeout)
            .with_parse_json(command.parse_json);
        match self.runner.run(invocation, logger).await {
            Err(err) if command.appended_output_flag() && err.mentions(UNKNOWN_OUTPUT_FLAG) => {
                logger.debug(
                    RUNNER_COMPONENT,
                    "Command doesn't support --output flag, retrying without it",
                );
                let retry = Invocation::new(command.argv_without_output())
                    .with_timeout(request.timeout)
                    .with_parse_json(false);
                self.runner.run(retry, logger).await
            }
            other => other,
        }
    }
}
