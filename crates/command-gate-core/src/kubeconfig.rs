// crates/command-gate-core/src/kubeconfig.rs
// ============================================================================
// Module: Kubeconfig Contexts
// Description: Kubeconfig path lookup and context enumeration.
// Purpose: List available contexts without invoking kubectl.
// Dependencies: dirs, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! The kubeconfig path comes from `KUBECONFIG` when set, otherwise
//! `<home>/.kube/config`. A missing file or unparseable YAML yields an empty
//! context list; only other I/O failures are errors. This lookup is used for
//! enumeration only and never affects command execution.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable that overrides the kubeconfig path.
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

// ============================================================================
// SECTION: Types
// ============================================================================

/// A kubeconfig context entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubectlContext {
    /// Context name.
    pub name: String,
    /// Cluster name.
    pub cluster: String,
    /// User name.
    pub user: String,
    /// Default namespace (empty when unset).
    #[serde(default)]
    pub namespace: String,
    /// Whether this is the current context.
    pub current: bool,
}

/// Context enumeration response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KubectlContextsResponse {
    /// Available contexts in file order.
    pub contexts: Vec<KubectlContext>,
    /// Number of contexts.
    pub total_count: usize,
}

/// Kubeconfig read errors.
#[derive(Debug, Error)]
pub enum KubeconfigError {
    /// No kubeconfig path could be determined.
    #[error("kubeconfig path unavailable: neither KUBECONFIG nor a home directory is set")]
    PathUnavailable,
    /// The file exists but could not be read.
    #[error("failed to read kubeconfig {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Subset of the kubeconfig document used for enumeration.
#[derive(Debug, Default, Deserialize)]
struct RawKubeconfig {
    /// Name of the current context.
    #[serde(rename = "current-context", default)]
    current_context: Option<String>,
    /// Named context entries.
    #[serde(default)]
    contexts: Option<Vec<RawNamedContext>>,
}

/// A `contexts[]` entry.
#[derive(Debug, Default, Deserialize)]
struct RawNamedContext {
    /// Context name.
    #[serde(default)]
    name: Option<String>,
    /// Context body.
    #[serde(default)]
    context: Option<RawContext>,
}

/// A context body.
#[derive(Debug, Default, Deserialize)]
struct RawContext {
    /// Cluster reference.
    #[serde(default)]
    cluster: Option<String>,
    /// User reference.
    #[serde(default)]
    user: Option<String>,
    /// Default namespace.
    #[serde(default)]
    namespace: Option<String>,
}

// ============================================================================
// SECTION: Path Lookup
// ============================================================================

/// Resolves the kubeconfig path from an env value and a home directory.
#[must_use]
pub fn resolve_kubeconfig_path(env_value: Option<&str>, home: Option<&Path>) -> Option<PathBuf> {
    match env_value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Some(PathBuf::from(value)),
        None => home.map(|home| home.join(".kube").join("config")),
    }
}

/// Returns the kubeconfig path for the current process environment.
#[must_use]
pub fn kubeconfig_path() -> Option<PathBuf> {
    let env_value = std::env::var(KUBECONFIG_ENV).ok();
    resolve_kubeconfig_path(env_value.as_deref(), dirs::home_dir().as_deref())
}

// ============================================================================
// SECTION: Enumeration
// ============================================================================

/// Parses kubeconfig YAML into a context list; invalid YAML yields an empty list.
#[must_use]
pub fn parse_contexts(yaml: &str) -> KubectlContextsResponse {
    let Ok(raw) = serde_yaml::from_str::<Option<RawKubeconfig>>(yaml) else {
        return KubectlContextsResponse::default();
    };
    let raw = raw.unwrap_or_default();
    let current = raw.current_context.unwrap_or_default();
    let contexts: Vec<KubectlContext> = raw
        .contexts
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let name = entry.name.unwrap_or_default();
            let body = entry.context.unwrap_or_default();
            KubectlContext {
                current: name == current,
                name,
                cluster: body.cluster.unwrap_or_default(),
                user: body.user.unwrap_or_default(),
                namespace: body.namespace.unwrap_or_default(),
            }
        })
        .collect();
    KubectlContextsResponse {
        total_count: contexts.len(),
        contexts,
    }
}

/// Loads contexts from `path`; a missing file yields an empty list.
///
/// # Errors
///
/// Returns [`KubeconfigError::Io`] when the file exists but cannot be read.
pub fn load_contexts(path: &Path) -> Result<KubectlContextsResponse, KubeconfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_contexts(&content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(KubectlContextsResponse::default()),
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            Ok(KubectlContextsResponse::default())
        }
        Err(source) => Err(KubeconfigError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Loads contexts from the process kubeconfig path.
///
/// # Errors
///
/// Returns [`KubeconfigError`] when no path is available or the file cannot
/// be read.
pub fn load_default_contexts() -> Result<KubectlContextsResponse, KubeconfigError> {
    let path = kubeconfig_path().ok_or(KubeconfigError::PathUnavailable)?;
    load_contexts(&path)
}
