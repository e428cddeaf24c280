// crates/command-gate-core/src/cluster.rs
// ============================================================================
// Module: Cluster Queries
// Description: Read-only cluster lookups built on the kubectl client.
// Purpose: Back the context, cluster-info, and namespace resources.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Convenience queries layered over [`KubectlClient`]: the current context,
//! raw cluster and version info, and the namespace list. All of them are
//! read-only and never pass through the approval gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::kubectl::KubectlClient;
use crate::kubectl::KubectlRequest;
use crate::logging::SessionLogger;
use crate::runner::CommandError;
use crate::runner::FailureCause;
use crate::runner::Invocation;

// ============================================================================
// SECTION: Models
// ============================================================================

/// Raw cluster information for a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Output of `kubectl cluster-info`.
    pub cluster_info: String,
    /// Output of `kubectl version`.
    pub version_info: String,
    /// Context used, or `default`.
    pub context: String,
}

/// A namespace object as returned by `kubectl get namespaces -o json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubernetesNamespace {
    /// Namespace metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Namespace status.
    #[serde(default)]
    pub status: Option<Map<String, Value>>,
}

impl KubernetesNamespace {
    /// Returns the namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn creation_timestamp(&self) -> Option<&str> {
        self.metadata.get("creationTimestamp").and_then(Value::as_str)
    }

    /// Returns the namespace phase.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref()?.get("phase").and_then(Value::as_str)
    }
}

/// Namespace listing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespacesResponse {
    /// Namespaces in the order kubectl returned them.
    pub namespaces: Vec<KubernetesNamespace>,
    /// Number of namespaces.
    pub total_count: usize,
    /// Context used, or `default`.
    pub context: String,
}

/// Label used when no explicit context is given.
const DEFAULT_CONTEXT_LABEL: &str = "default";

// ============================================================================
// SECTION: Queries
// ============================================================================

impl KubectlClient {
    /// Returns the current context name, or `None` when it cannot be
    /// determined. Failures are not logged.
    pub async fn current_context(&self, logger: &SessionLogger) -> Option<String> {
        let invocation = Invocation::new([self.program(), "config", "current-context"])
            .with_check(false)
            .with_log_errors(false);
        let result = self.runner().run(invocation, logger).await.ok()?;
        let name = result.stdout.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Collects `cluster-info` and `version` output for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when either command fails.
    pub async fn cluster_info(
        &self,
        context: Option<&str>,
        logger: &SessionLogger,
    ) -> Result<ClusterInfo, CommandError> {
        let cluster_info = self
            .run(&plain_request("cluster-info", context), logger)
            .await?
            .stdout;
        let version_info = self.run(&plain_request("version", context), logger).await?.stdout;
        Ok(ClusterInfo {
            cluster_info,
            version_info,
            context: context.unwrap_or(DEFAULT_CONTEXT_LABEL).to_string(),
        })
    }

    /// Lists namespaces for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command fails or its output is not a
    /// JSON namespace list.
    pub async fn namespaces(
        &self,
        context: Option<&str>,
        logger: &SessionLogger,
    ) -> Result<NamespacesResponse, CommandError> {
        let request = KubectlRequest::new(["get", "namespaces"]).with_context(context);
        let result = self.run(&request, logger).await?;
        let malformed = |detail: String| CommandError {
            cause: FailureCause::MalformedOutput,
            message: format!("Unexpected namespace list output: {detail}"),
            argv: self.build(&request).argv,
            exit_code: result.exit_code,
            stderr: result.stderr.clone(),
        };
        let Some(structured) = result.structured.as_ref() else {
            return Err(malformed("expected JSON".to_string()));
        };
        let items = structured.get("items").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
        let namespaces: Vec<KubernetesNamespace> =
            serde_json::from_value(items).map_err(|err| malformed(err.to_string()))?;
        Ok(NamespacesResponse {
            total_count: namespaces.len(),
            namespaces,
            context: context.unwrap_or(DEFAULT_CONTEXT_LABEL).to_string(),
        })
    }
}

/// Builds a request with the output flag disabled.
fn plain_request(verb: &str, context: Option<&str>) -> KubectlRequest {
    KubectlRequest::new([verb]).with_context(context).with_output_format(None::<String>)
}

#[cfg(test)]
mod tests;
