// crates/command-gate-mcp/src/server.rs
// ============================================================================
// Module: Gateway Facade
// Description: Wires configuration, telemetry, approval, and routers.
// Purpose: Give transports one entry point for tools and resources.
// Dependencies: command-gate-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`McpGateway`] is built once from a validated [`GatewayConfig`] and then
//! serves every session. Per-session state (logger, confirmation channel,
//! request metadata) arrives with each call in a [`ToolSession`]; the gateway
//! itself holds no session state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use command_gate_core::CommandRunner;
use command_gate_core::KubectlClient;
use command_gate_core::LogSink;
use command_gate_core::ProcessRunner;
use command_gate_core::SessionLogger;
use command_gate_core::logging::LevelFilterSink;
use command_gate_core::logging::StderrLogSink;
use command_gate_core::logging::TracingLogSink;
use serde_json::Value;

use crate::approval::ApprovalGate;
use crate::config::ConfigError;
use crate::config::GatewayConfig;
use crate::config::LogSinkKind;
use crate::config::LoggingConfig;
use crate::config::SpanExporterKind;
use crate::resources::ResourceContent;
use crate::resources::ResourceDefinition;
use crate::resources::ResourceError;
use crate::resources::ResourceRouter;
use crate::session::ToolSession;
use crate::telemetry::InMemorySpanExporter;
use crate::telemetry::LogSpanExporter;
use crate::telemetry::NoopSpanExporter;
use crate::telemetry::SpanExporter;
use crate::telemetry::SpanRecord;
use crate::telemetry::ToolTracer;
use crate::telemetry::TracerOptions;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolOutput;
use crate::tools::ToolRouter;
use crate::tools::ToolRouterSettings;

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Kubectl command gateway.
#[derive(Clone)]
pub struct McpGateway {
    /// Validated configuration.
    config: GatewayConfig,
    /// Tool router.
    tools: ToolRouter,
    /// Resource router.
    resources: ResourceRouter,
    /// Span store when the memory exporter is selected.
    memory_spans: Option<Arc<InMemorySpanExporter>>,
}

impl McpGateway {
    /// Builds a gateway that runs real kubectl processes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn from_config(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    /// Builds a gateway that executes through `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn with_runner(
        config: GatewayConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let memory_spans = (config.telemetry.exporter == SpanExporterKind::Memory)
            .then(|| Arc::new(InMemorySpanExporter::new()));
        let exporter: Arc<dyn SpanExporter> = match (&memory_spans, config.telemetry.exporter) {
            (Some(memory), _) => memory.clone(),
            (None, SpanExporterKind::Log) => Arc::new(LogSpanExporter),
            (None, _) => Arc::new(NoopSpanExporter),
        };
        let tracer = ToolTracer::new(exporter, config.telemetry.service_name.clone());
        let options = TracerOptions::from_config(&config.telemetry);
        let kubectl = KubectlClient::new(runner).with_program(config.kubectl.program.clone());
        let gate = ApprovalGate::new(config.approval.required, config.approval.redact_audit_args);
        let tools = ToolRouter::new(
            kubectl.clone(),
            gate,
            tracer.clone(),
            ToolRouterSettings {
                server_name: config.server.name.clone(),
                default_timeout: config.kubectl.default_timeout(),
                tracer_options: options.clone(),
            },
        );
        let resources = ResourceRouter::new(kubectl, tracer, options);
        tracing::info!(
            server = %config.server.name,
            program = %config.kubectl.program,
            approval_required = config.approval.required,
            "gateway configured"
        );
        Ok(Self {
            config,
            tools,
            resources,
            memory_spans,
        })
    }

    /// Reads kubeconfig contexts from `path` instead of the process default.
    #[must_use]
    pub fn with_kubeconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources = self.resources.with_kubeconfig_path(path);
        self
    }

    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Returns the instructions text for clients.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.config.server.instructions
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Lists tool definitions.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.list_tools()
    }

    /// Calls the tool `name` with `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when routing, validation, confirmation, or the
    /// command fails.
    pub async fn call_tool(
        &self,
        session: &ToolSession,
        name: &str,
        params: Value,
    ) -> Result<ToolOutput, ToolError> {
        self.tools.handle_tool_call(session, name, params).await
    }

    /// Lists resource definitions.
    #[must_use]
    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        self.resources.list_resources()
    }

    /// Reads the resource at `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when `uri` does not address a resource.
    pub async fn read_resource(
        &self,
        session: &ToolSession,
        uri: &str,
    ) -> Result<ResourceContent, ResourceError> {
        self.resources.read_resource(session, uri).await
    }

    /// Returns spans recorded by the memory exporter; empty for other
    /// exporters.
    #[must_use]
    pub fn recorded_spans(&self) -> Vec<SpanRecord> {
        self.memory_spans.as_ref().map(|memory| memory.spans()).unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Session Logging
// ============================================================================

/// Builds the session logger selected by `config`.
#[must_use]
pub fn session_logger(config: &LoggingConfig) -> SessionLogger {
    let sink: Arc<dyn LogSink> = match config.sink {
        LogSinkKind::None => return SessionLogger::disabled(),
        LogSinkKind::Stderr => Arc::new(StderrLogSink),
        LogSinkKind::Tracing => Arc::new(TracingLogSink),
    };
    SessionLogger::new(Arc::new(LevelFilterSink::new(config.min_level, sink)))
}
