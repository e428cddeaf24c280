// crates/command-gate-mcp/src/session.rs
// ============================================================================
// Module: Tool Sessions
// Description: Per-call request metadata, logger, and confirmation channel.
// Purpose: Carry session-scoped collaborators explicitly through each call.
// Dependencies: command-gate-core, serde
// ============================================================================

//! ## Overview
//! A [`ToolSession`] bundles everything a single client session contributes
//! to a call: identifying metadata for spans, the session logger, and the
//! channel used to ask the user for approval. Nothing here is global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use command_gate_core::SessionLogger;
use serde::Serialize;

use crate::approval::ConfirmationProvider;
use crate::approval::UnavailableConfirmation;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Identifying metadata for the calling request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    /// Transport request identifier.
    pub request_id: Option<String>,
    /// Client session identifier.
    pub session_id: Option<String>,
    /// Client name.
    pub client: Option<String>,
    /// Negotiated protocol version.
    pub protocol_version: Option<String>,
}

impl RequestContext {
    /// Returns the non-empty identifying fields as `(name, value)` pairs.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("request_id", self.request_id.as_deref()),
            ("session_id", self.session_id.as_deref()),
            ("client", self.client.as_deref()),
            ("protocol_version", self.protocol_version.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.filter(|value| !value.is_empty()).map(|value| (name, value)))
        .collect()
    }
}

// ============================================================================
// SECTION: Tool Session
// ============================================================================

/// Session-scoped collaborators for one call.
#[derive(Clone)]
pub struct ToolSession {
    /// Request metadata recorded on spans.
    pub context: RequestContext,
    /// Logger delivering messages to the session.
    pub logger: SessionLogger,
    /// Channel for approval decisions.
    pub confirmation: Arc<dyn ConfirmationProvider>,
}

impl ToolSession {
    /// Creates a session.
    #[must_use]
    pub fn new(
        context: RequestContext,
        logger: SessionLogger,
        confirmation: Arc<dyn ConfirmationProvider>,
    ) -> Self {
        Self {
            context,
            logger,
            confirmation,
        }
    }

    /// Creates a session with no logger and no way to ask for approval.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(
            RequestContext::default(),
            SessionLogger::disabled(),
            Arc::new(UnavailableConfirmation),
        )
    }
}

impl fmt::Debug for ToolSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ToolSession")
            .field("context", &self.context)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
