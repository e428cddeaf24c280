// crates/command-gate-cli/src/main.rs
// ============================================================================
// Module: Command Gate CLI Entry Point
// Description: Local driver for the kubectl command gateway.
// Purpose: List, call, and read gateway tools and resources from a terminal.
// Dependencies: clap, command-gate-mcp, serde_json, thiserror, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `command-gate` binary builds an [`McpGateway`] from environment
//! configuration plus command-line overrides and runs exactly one operation.
//! Mutating kubectl commands are confirmed on the terminal unless `--yes` is
//! given. Results go to stdout; diagnostics and prompts go to stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod confirm;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use command_gate_mcp::ConfirmationDecision;
use command_gate_mcp::ConfirmationProvider;
use command_gate_mcp::GatewayConfig;
use command_gate_mcp::LogSinkKind;
use command_gate_mcp::McpGateway;
use command_gate_mcp::RequestContext;
use command_gate_mcp::StaticConfirmation;
use command_gate_mcp::ToolOutput;
use command_gate_mcp::ToolSession;
use command_gate_mcp::session_logger;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::confirm::TerminalConfirmation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Client name recorded on request spans.
const CLIENT_NAME: &str = "command-gate-cli";

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "command-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Emit debug diagnostics unless `RUST_LOG` says otherwise.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    /// Run mutating kubectl verbs without asking.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    no_approval: bool,
    /// Session log destination (overrides `COMMAND_GATE_LOG_SINK`).
    #[arg(long, value_enum, value_name = "SINK", global = true)]
    log: Option<LogArg>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List tool definitions.
    Tools,
    /// List resource definitions.
    Resources,
    /// Call a tool.
    Call {
        /// Tool name.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, value_name = "JSON")]
        args: Option<String>,
        /// Approve mutating commands without prompting.
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Read a resource.
    Read {
        /// Resource URI, e.g. `kubectl://contexts`.
        uri: String,
    },
}

/// Session log sink selection.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum LogArg {
    /// Drop session messages.
    None,
    /// JSON lines on stderr.
    Stderr,
    /// Forward to the tracing subscriber.
    Tracing,
}

impl From<LogArg> for LogSinkKind {
    fn from(arg: LogArg) -> Self {
        match arg {
            LogArg::None => Self::None,
            LogArg::Stderr => Self::Stderr,
            LogArg::Tracing => Self::Tracing,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the parsed command.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    init_tracing(cli.verbose);
    let config = build_config(&cli, GatewayConfig::from_env())?;
    let gateway = McpGateway::from_config(config)
        .map_err(|err| CliError::new(format!("configuration rejected: {err}")))?;
    match cli.command {
        Commands::Tools => {
            write_json(&serde_json::to_value(gateway.list_tools()).map_err(json_error)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resources => {
            write_json(&serde_json::to_value(gateway.list_resources()).map_err(json_error)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Call {
            tool,
            args,
            yes,
        } => command_call(&gateway, &tool, args.as_deref(), yes).await,
        Commands::Read {
            uri,
        } => command_read(&gateway, &uri).await,
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Applies command-line overrides to the environment configuration.
fn build_config(
    cli: &Cli,
    from_env: Result<GatewayConfig, command_gate_mcp::ConfigError>,
) -> CliResult<GatewayConfig> {
    let mut config =
        from_env.map_err(|err| CliError::new(format!("configuration rejected: {err}")))?;
    if cli.no_approval {
        config.approval.required = false;
    }
    if let Some(log) = cli.log {
        config.logging.sink = log.into();
    }
    Ok(config)
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `call` command.
async fn command_call(
    gateway: &McpGateway,
    tool: &str,
    args: Option<&str>,
    yes: bool,
) -> CliResult<ExitCode> {
    let params = parse_args(args)?;
    let confirmation: Arc<dyn ConfirmationProvider> = if yes {
        Arc::new(StaticConfirmation::new(ConfirmationDecision::Accepted {
            proceed: true,
        }))
    } else {
        Arc::new(TerminalConfirmation)
    };
    let session = cli_session(gateway, confirmation);
    let output = gateway.call_tool(&session, tool, params).await.map_err(|err| {
        CliError::new(format!("{tool} failed [{} {}]: {err}", err.kind(), err.code()))
    })?;
    match output {
        ToolOutput::Text(text) => write_stdout_line(&text)?,
        ToolOutput::Structured(value) => write_json(&value)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `read` command.
async fn command_read(gateway: &McpGateway, uri: &str) -> CliResult<ExitCode> {
    let session = cli_session(gateway, Arc::new(TerminalConfirmation));
    let content = gateway
        .read_resource(&session, uri)
        .await
        .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&content.to_value())?;
    Ok(if content.is_error() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the `--args` payload; absent means an empty object.
fn parse_args(args: Option<&str>) -> CliResult<Value> {
    let Some(raw) = args else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| CliError::new(format!("--args is not valid JSON: {err}")))?;
    if !value.is_object() {
        return Err(CliError::new("--args must be a JSON object".to_string()));
    }
    Ok(value)
}

/// Builds the single session used by this process.
fn cli_session(gateway: &McpGateway, confirmation: Arc<dyn ConfirmationProvider>) -> ToolSession {
    let context = RequestContext {
        request_id: Some("1".to_string()),
        session_id: Some(std::process::id().to_string()),
        client: Some(CLIENT_NAME.to_string()),
        protocol_version: None,
    };
    ToolSession::new(context, session_logger(&gateway.config().logging), confirmation)
}

/// Formats a JSON rendering failure.
fn json_error(err: serde_json::Error) -> CliError {
    CliError::new(format!("failed to render JSON: {err}"))
}

/// Writes pretty JSON to stdout.
fn write_json(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(json_error)?;
    write_stdout_line(&rendered)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
