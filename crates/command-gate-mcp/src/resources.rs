// crates/command-gate-mcp/src/resources.rs
// ============================================================================
// Module: Resource Surface
// Description: Read-only kubectl resources addressed by `kubectl://` URIs.
// Purpose: Expose contexts, cluster info, and namespaces to clients.
// Dependencies: command-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ResourceRouter`] resolves `kubectl://contexts`,
//! `kubectl://cluster-info/{context}`, and `kubectl://namespaces/{context}`.
//! Every read runs inside a span named `resource.<name>` with the
//! `mcp.resource` attribute prefix. Lookup failures become an
//! [`ErrorResponse`] payload; only unparseable URIs are errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::path::PathBuf;

use command_gate_core::ClusterInfo;
use command_gate_core::CommandError;
use command_gate_core::KubectlClient;
use command_gate_core::KubectlContextsResponse;
use command_gate_core::NamespacesResponse;
use command_gate_core::kubeconfig;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::session::ToolSession;
use crate::telemetry::CallSite;
use crate::telemetry::ReturnLength;
use crate::telemetry::ToolTracer;
use crate::telemetry::TracerOptions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI scheme prefix.
const SCHEME: &str = "kubectl://";
/// Contexts resource URI.
pub const CONTEXTS_URI: &str = "kubectl://contexts";
/// Cluster info URI template.
pub const CLUSTER_INFO_TEMPLATE: &str = "kubectl://cluster-info/{context}";
/// Namespaces URI template.
pub const NAMESPACES_TEMPLATE: &str = "kubectl://namespaces/{context}";
/// Attribute prefix for resource spans.
pub const RESOURCE_ATTRIBUTE_PREFIX: &str = "mcp.resource";
/// Context label meaning "no explicit context".
pub const DEFAULT_CONTEXT: &str = "default";
/// MIME type of every resource payload.
const JSON_MIME_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Kubeconfig contexts.
    Contexts,
    /// Cluster info and version for a context.
    ClusterInfo,
    /// Namespace list for a context.
    Namespaces,
}

impl ResourceKind {
    /// Returns all resource kinds in listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Contexts, Self::ClusterInfo, Self::Namespaces]
    }

    /// Returns the resource name recorded on spans.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contexts => "kubectl_contexts",
            Self::ClusterInfo => "kubectl_cluster_info",
            Self::Namespaces => "kubectl_namespaces",
        }
    }

    /// Returns the URI or URI template.
    #[must_use]
    pub const fn uri_template(self) -> &'static str {
        match self {
            Self::Contexts => CONTEXTS_URI,
            Self::ClusterInfo => CLUSTER_INFO_TEMPLATE,
            Self::Namespaces => NAMESPACES_TEMPLATE,
        }
    }

    /// Returns the client-facing description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Contexts => "List all available kubectl contexts.",
            Self::ClusterInfo => "Get cluster information for specified context.",
            Self::Namespaces => "List all namespaces in the specified context.",
        }
    }

    /// Returns the span name for reads of this resource.
    #[must_use]
    pub fn span_name(self) -> String {
        format!("resource.{}", self.as_str())
    }
}

/// Resource definition used by resource listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDefinition {
    /// URI, or URI template with a `{context}` placeholder.
    pub uri: &'static str,
    /// Resource name.
    pub name: &'static str,
    /// Client-facing description.
    pub description: &'static str,
    /// Payload MIME type.
    pub mime_type: &'static str,
}

/// Returns the definitions of every resource.
#[must_use]
pub fn resource_definitions() -> Vec<ResourceDefinition> {
    ResourceKind::all()
        .iter()
        .map(|kind| ResourceDefinition {
            uri: kind.uri_template(),
            name: kind.as_str(),
            description: kind.description(),
            mime_type: JSON_MIME_TYPE,
        })
        .collect()
}

// ============================================================================
// SECTION: URIs
// ============================================================================

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    /// `kubectl://contexts`.
    Contexts,
    /// `kubectl://cluster-info/{context}`.
    ClusterInfo {
        /// Context segment as written.
        context: String,
    },
    /// `kubectl://namespaces/{context}`.
    Namespaces {
        /// Context segment as written.
        context: String,
    },
}

impl ResourceUri {
    /// Parses `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnknownResource`] for URIs outside the
    /// `kubectl://` namespace and [`ResourceError::InvalidUri`] for a missing
    /// or malformed context segment.
    pub fn parse(uri: &str) -> Result<Self, ResourceError> {
        let path = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| ResourceError::UnknownResource(uri.to_string()))?;
        if path == "contexts" {
            return Ok(Self::Contexts);
        }
        let (head, context) = path
            .split_once('/')
            .ok_or_else(|| ResourceError::UnknownResource(uri.to_string()))?;
        if !matches!(head, "cluster-info" | "namespaces") {
            return Err(ResourceError::UnknownResource(uri.to_string()));
        }
        if context.is_empty() || context.contains('/') {
            return Err(ResourceError::InvalidUri(uri.to_string()));
        }
        let context = context.to_string();
        Ok(if head == "cluster-info" {
            Self::ClusterInfo {
                context,
            }
        } else {
            Self::Namespaces {
                context,
            }
        })
    }

    /// Returns the resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Contexts => ResourceKind::Contexts,
            Self::ClusterInfo {
                ..
            } => ResourceKind::ClusterInfo,
            Self::Namespaces {
                ..
            } => ResourceKind::Namespaces,
        }
    }

    /// Returns the context segment, if the URI has one.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Contexts => None,
            Self::ClusterInfo {
                context,
            }
            | Self::Namespaces {
                context,
            } => Some(context),
        }
    }
}

// ============================================================================
// SECTION: Payloads and Errors
// ============================================================================

/// Error payload returned in place of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Context where the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// Builds an error payload from a command failure.
    fn from_command(error: String, context: &str, failure: &CommandError) -> Self {
        Self {
            error,
            context: Some(context.to_string()),
            details: Some(json!({
                "cause": failure.cause,
                "exit_code": failure.exit_code,
                "stderr": failure.stderr,
            })),
        }
    }
}

/// Resource read result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceContent {
    /// Kubeconfig contexts.
    Contexts(KubectlContextsResponse),
    /// Cluster info.
    ClusterInfo(ClusterInfo),
    /// Namespace list.
    Namespaces(NamespacesResponse),
    /// Lookup failure.
    Error(ErrorResponse),
}

impl ResourceContent {
    /// Returns true when the read produced an error payload.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Converts the content into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl ReturnLength for ResourceContent {
    fn return_length(&self) -> usize {
        self.to_value().return_length()
    }
}

/// Resource addressing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// No resource is registered under the URI.
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    /// The URI matched a template but its context segment is unusable.
    #[error("invalid resource uri: {0}")]
    InvalidUri(String),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes resource reads.
#[derive(Clone)]
pub struct ResourceRouter {
    /// Kubectl command client.
    kubectl: KubectlClient,
    /// Call interceptor.
    tracer: ToolTracer,
    /// Span recording options with the resource prefix.
    options: TracerOptions,
    /// Kubeconfig path override; `None` uses the process default.
    kubeconfig_path: Option<PathBuf>,
}

impl ResourceRouter {
    /// Creates a router; `options` are re-prefixed with `mcp.resource`.
    #[must_use]
    pub fn new(kubectl: KubectlClient, tracer: ToolTracer, options: TracerOptions) -> Self {
        Self {
            kubectl,
            tracer,
            options: options.with_prefix(RESOURCE_ATTRIBUTE_PREFIX),
            kubeconfig_path: None,
        }
    }

    /// Reads contexts from `path` instead of the process kubeconfig.
    #[must_use]
    pub fn with_kubeconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig_path = Some(path.into());
        self
    }

    /// Lists resource definitions.
    #[must_use]
    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        resource_definitions()
    }

    /// Reads the resource at `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when `uri` does not address a resource.
    /// Lookup failures are returned as [`ResourceContent::Error`].
    pub async fn read_resource(
        &self,
        session: &ToolSession,
        uri: &str,
    ) -> Result<ResourceContent, ResourceError> {
        let target = ResourceUri::parse(uri)?;
        let kind = target.kind();
        let mut args = Map::new();
        if let Some(context) = target.context() {
            args.insert("context".to_string(), Value::String(context.to_string()));
        }
        let span_name = kind.span_name();
        let call = CallSite {
            span_name: &span_name,
            function_name: kind.as_str(),
            options: &self.options,
            args: &args,
            context: Some(&session.context),
        };
        let content = self
            .tracer
            .instrument(call, async { Ok::<_, Infallible>(self.resolve(session, &target).await) })
            .await;
        match content {
            Ok(content) => Ok(content),
            Err(never) => match never {},
        }
    }

    /// Performs the lookup for `target`, folding failures into the payload.
    async fn resolve(&self, session: &ToolSession, target: &ResourceUri) -> ResourceContent {
        match target {
            ResourceUri::Contexts => {
                let loaded = match &self.kubeconfig_path {
                    Some(path) => kubeconfig::load_contexts(path),
                    None => kubeconfig::load_default_contexts(),
                };
                match loaded {
                    Ok(contexts) => ResourceContent::Contexts(contexts),
                    Err(err) => ResourceContent::Error(ErrorResponse {
                        error: format!("Error getting kubectl contexts: {err}"),
                        context: None,
                        details: None,
                    }),
                }
            }
            ResourceUri::ClusterInfo {
                context,
            } => match self.kubectl.cluster_info(explicit(context), &session.logger).await {
                Ok(info) => ResourceContent::ClusterInfo(info),
                Err(err) => ResourceContent::Error(ErrorResponse::from_command(
                    format!("Error getting cluster info for context '{context}': {err}"),
                    context,
                    &err,
                )),
            },
            ResourceUri::Namespaces {
                context,
            } => match self.kubectl.namespaces(explicit(context), &session.logger).await {
                Ok(namespaces) => ResourceContent::Namespaces(namespaces),
                Err(err) => ResourceContent::Error(ErrorResponse::from_command(
                    format!("Error getting namespaces for context '{context}': {err}"),
                    context,
                    &err,
                )),
            },
        }
    }
}

/// Maps the `default` label to "no explicit context".
fn explicit(context: &str) -> Option<&str> {
    (context != DEFAULT_CONTEXT).then_some(context)
}
