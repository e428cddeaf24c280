// crates/command-gate-mcp/src/approval.rs
// ============================================================================
// Module: Approval Gate
// Description: User confirmation for mutating kubectl verbs.
// Purpose: Suspend dangerous calls until an external decision arrives.
// Dependencies: async-trait, command-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ApprovalGate::evaluate`] decides whether a kubectl invocation may run.
//! Mutating verbs suspend the calling task on a [`ConfirmationProvider`]
//! until the user answers; the gate never touches the runner itself.
//! States: `Idle -> AwaitingDecision -> {Proceeding, RejectedByUser,
//! CancelledByUser}`, or `Idle -> Proceeding` when approval is not required.
//! Invariants:
//! - Refusals are values ([`Refusal`]), never errors.
//! - Every transition is logged with the argument vector and the outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use async_trait::async_trait;
use command_gate_core::LogLevel;
use command_gate_core::SessionLogger;
use serde_json::json;
use thiserror::Error;

use crate::telemetry::redact_argv;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Component tag for approval log lines.
pub const APPROVAL_COMPONENT: &str = "kubectl";
/// Verbs that require approval.
pub const MUTATING_VERBS: [&str; 12] = [
    "delete", "apply", "create", "replace", "patch", "edit", "scale", "rollout", "drain", "cordon",
    "uncordon", "taint",
];
/// Result text when the user answers no.
pub const REJECTED_BY_USER: &str = "rejected by user";
/// Result text when the user declines the prompt.
pub const DECLINED_BY_USER: &str = "declined by user";
/// Result text when the user cancels the prompt.
pub const CANCELLED_BY_USER: &str = "cancelled by user";

/// Returns true when `verb` requires approval (case-insensitive).
#[must_use]
pub fn is_mutating_verb(verb: &str) -> bool {
    MUTATING_VERBS.iter().any(|candidate| candidate.eq_ignore_ascii_case(verb))
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// A user's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    /// The user answered; `proceed` carries yes or no.
    Accepted {
        /// Whether to run the command.
        proceed: bool,
    },
    /// The user declined to answer.
    Declined,
    /// The user dismissed the prompt.
    Cancelled,
}

/// Prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    /// Human-readable description of the exact command.
    pub message: String,
    /// Full argument vector.
    pub argv: Vec<String>,
    /// Mutating verb that triggered the prompt.
    pub verb: String,
}

impl ConfirmationPrompt {
    /// Builds the prompt for `argv`.
    #[must_use]
    pub fn for_command(argv: &[String], verb: &str) -> Self {
        Self {
            message: format!(
                "The command '{}' is potentially destructive. Do you want to proceed?",
                argv.join(" ")
            ),
            argv: argv.to_vec(),
            verb: verb.to_string(),
        }
    }
}

/// Approval channel failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    /// The session offers no way to ask the user.
    #[error("confirmation unavailable: {0}")]
    Unavailable(String),
    /// Asking the user failed.
    #[error("confirmation failed: {0}")]
    Failed(String),
}

/// Source of user decisions for one session.
#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    /// Asks the user about `prompt` and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError`] when the question cannot be delivered or
    /// answered.
    async fn request_decision(
        &self,
        prompt: &ConfirmationPrompt,
    ) -> Result<ConfirmationDecision, ApprovalError>;
}

/// Provider that always returns the same decision and remembers prompts.
pub struct StaticConfirmation {
    /// Decision returned for every prompt.
    decision: ConfirmationDecision,
    /// Prompts received.
    prompts: Mutex<Vec<ConfirmationPrompt>>,
}

impl StaticConfirmation {
    /// Creates a provider answering `decision`.
    #[must_use]
    pub const fn new(decision: ConfirmationDecision) -> Self {
        Self {
            decision,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<ConfirmationPrompt> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ConfirmationProvider for StaticConfirmation {
    async fn request_decision(
        &self,
        prompt: &ConfirmationPrompt,
    ) -> Result<ConfirmationDecision, ApprovalError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        Ok(self.decision)
    }
}

/// Provider for sessions that cannot ask the user.
pub struct UnavailableConfirmation;

#[async_trait]
impl ConfirmationProvider for UnavailableConfirmation {
    async fn request_decision(
        &self,
        _prompt: &ConfirmationPrompt,
    ) -> Result<ConfirmationDecision, ApprovalError> {
        Err(ApprovalError::Unavailable("session cannot request user confirmation".to_string()))
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Gate state labels used in transition logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No decision pending.
    Idle,
    /// Waiting for the user.
    AwaitingDecision,
    /// Execution may continue.
    Proceeding,
    /// The user answered no.
    RejectedByUser,
    /// The user declined or cancelled.
    CancelledByUser,
}

impl GateState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingDecision => "awaiting_decision",
            Self::Proceeding => "proceeding",
            Self::RejectedByUser => "rejected_by_user",
            Self::CancelledByUser => "cancelled_by_user",
        }
    }
}

/// A non-error refusal to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The user answered no.
    Rejected,
    /// The user declined the prompt.
    Declined,
    /// The user cancelled the prompt.
    Cancelled,
}

impl Refusal {
    /// Returns the result text handed back to the caller.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Rejected => REJECTED_BY_USER,
            Self::Declined => DECLINED_BY_USER,
            Self::Cancelled => CANCELLED_BY_USER,
        }
    }

    /// Returns the terminal gate state.
    #[must_use]
    pub const fn state(self) -> GateState {
        match self {
            Self::Rejected => GateState::RejectedByUser,
            Self::Declined | Self::Cancelled => GateState::CancelledByUser,
        }
    }
}

/// Gate verdict for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Run the command.
    Proceed,
    /// Do not run the command.
    Refused(Refusal),
}

/// Confirmation gate for mutating verbs.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalGate {
    /// Ask before mutating verbs.
    required: bool,
    /// Mask secret-looking arguments in log lines.
    redact_audit_args: bool,
}

impl ApprovalGate {
    /// Creates a gate.
    #[must_use]
    pub const fn new(required: bool, redact_audit_args: bool) -> Self {
        Self {
            required,
            redact_audit_args,
        }
    }

    /// Returns whether approval is required at all.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns whether `verb` would suspend for a decision.
    #[must_use]
    pub fn needs_decision(&self, verb: Option<&str>) -> bool {
        self.required && verb.is_some_and(is_mutating_verb)
    }

    /// Decides whether `argv` may run, asking `provider` when needed.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError`] when the confirmation channel fails.
    pub async fn evaluate(
        &self,
        argv: &[String],
        verb: Option<&str>,
        provider: &dyn ConfirmationProvider,
        logger: &SessionLogger,
    ) -> Result<GateOutcome, ApprovalError> {
        let Some(verb) = verb.filter(|verb| self.required && is_mutating_verb(verb)) else {
            self.transition(
                logger,
                LogLevel::Debug,
                argv,
                GateState::Proceeding,
                "Command does not require approval",
            );
            return Ok(GateOutcome::Proceed);
        };

        self.transition(
            logger,
            LogLevel::Info,
            argv,
            GateState::AwaitingDecision,
            &format!("Requesting user approval for '{verb}' command"),
        );
        let prompt = ConfirmationPrompt::for_command(argv, verb);
        let decision = match provider.request_decision(&prompt).await {
            Ok(decision) => decision,
            Err(err) => {
                self.transition(
                    logger,
                    LogLevel::Error,
                    argv,
                    GateState::Idle,
                    &format!("Approval request failed: {err}"),
                );
                return Err(err);
            }
        };

        let outcome = match decision {
            ConfirmationDecision::Accepted {
                proceed: true,
            } => GateOutcome::Proceed,
            ConfirmationDecision::Accepted {
                proceed: false,
            } => GateOutcome::Refused(Refusal::Rejected),
            ConfirmationDecision::Declined => GateOutcome::Refused(Refusal::Declined),
            ConfirmationDecision::Cancelled => GateOutcome::Refused(Refusal::Cancelled),
        };
        match outcome {
            GateOutcome::Proceed => {
                self.transition(
                    logger,
                    LogLevel::Info,
                    argv,
                    GateState::Proceeding,
                    "User approved command",
                );
            }
            GateOutcome::Refused(refusal) => {
                self.transition(
                    logger,
                    LogLevel::Warning,
                    argv,
                    refusal.state(),
                    &format!("Command {}", refusal.message()),
                );
            }
        }
        Ok(outcome)
    }

    /// Logs a state transition with the (optionally redacted) argument vector.
    fn transition(
        &self,
        logger: &SessionLogger,
        level: LogLevel,
        argv: &[String],
        state: GateState,
        message: &str,
    ) {
        let audited = if self.redact_audit_args { redact_argv(argv) } else { argv.to_vec() };
        tracing::debug!(state = state.as_str(), "approval transition");
        logger.log(
            level,
            APPROVAL_COMPONENT,
            message,
            Some(json!({"argv": audited, "outcome": state.as_str()})),
        );
    }
}
