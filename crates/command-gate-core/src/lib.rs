// crates/command-gate-core/src/lib.rs
// ============================================================================
// Module: Command Gate Core
// Description: Process execution, kubectl command assembly, and session logs.
// Purpose: Provide the execution layer shared by the gateway and the CLI.
// Dependencies: async-trait, dirs, serde, serde_json, serde_yaml, tokio, tracing
// ============================================================================

//! ## Overview
//! This crate runs external programs with timeouts and classified failures,
//! assembles kubectl argument vectors (context, namespace, output flags, and
//! the single `--output` fallback), enumerates kubeconfig contexts, and
//! carries the per-session logger that every call path threads explicitly.
//! Invariants:
//! - Every invocation yields exactly one result or one classified failure.
//! - Logging never changes the outcome of a call.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cluster;
pub mod kubeconfig;
pub mod kubectl;
pub mod logging;
pub mod runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cluster::ClusterInfo;
pub use cluster::KubernetesNamespace;
pub use cluster::NamespacesResponse;
pub use kubeconfig::KubeconfigError;
pub use kubeconfig::KubectlContext;
pub use kubeconfig::KubectlContextsResponse;
pub use kubectl::KubectlClient;
pub use kubectl::KubectlCommand;
pub use kubectl::KubectlRequest;
pub use logging::LogLevel;
pub use logging::LogRecord;
pub use logging::LogSink;
pub use logging::MemoryLogSink;
pub use logging::SessionLogger;
pub use runner::CommandError;
pub use runner::CommandOutput;
pub use runner::CommandRunner;
pub use runner::ExecutionResult;
pub use runner::FailureCause;
pub use runner::Invocation;
pub use runner::ProcessRunner;
