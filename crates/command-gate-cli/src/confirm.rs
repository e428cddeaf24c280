// crates/command-gate-cli/src/confirm.rs
// ============================================================================
// Module: Terminal Confirmation
// Description: Confirmation provider that asks on the controlling terminal.
// Purpose: Let a local operator approve or refuse mutating kubectl commands.
// Dependencies: async-trait, command-gate-mcp, tokio
// ============================================================================

//! ## Overview
//! [`TerminalConfirmation`] writes the prompt to stderr and reads one answer
//! per line from stdin on a blocking worker. End of input cancels; answers
//! that match nothing are asked again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::Write;

use async_trait::async_trait;
use command_gate_mcp::ApprovalError;
use command_gate_mcp::ConfirmationDecision;
use command_gate_mcp::ConfirmationPrompt;
use command_gate_mcp::ConfirmationProvider;

// ============================================================================
// SECTION: Answers
// ============================================================================

/// Maps one line of user input to a decision.
#[must_use]
pub fn parse_answer(answer: &str) -> Option<ConfirmationDecision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(ConfirmationDecision::Accepted {
            proceed: true,
        }),
        "n" | "no" => Some(ConfirmationDecision::Accepted {
            proceed: false,
        }),
        "d" | "decline" => Some(ConfirmationDecision::Declined),
        "c" | "cancel" => Some(ConfirmationDecision::Cancelled),
        _ => None,
    }
}

/// Reads answers from `input` until one is recognized; end of input cancels.
///
/// # Errors
///
/// Returns the underlying I/O error when reading or prompting fails.
pub fn read_decision(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> std::io::Result<ConfirmationDecision> {
    loop {
        write!(output, "{prompt} [y]es/[n]o/[d]ecline/[c]ancel: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(ConfirmationDecision::Cancelled);
        }
        if let Some(decision) = parse_answer(&line) {
            return Ok(decision);
        }
        writeln!(output, "Unrecognized answer '{}'.", line.trim())?;
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Confirmation provider bound to the process terminal.
pub struct TerminalConfirmation;

#[async_trait]
impl ConfirmationProvider for TerminalConfirmation {
    async fn request_decision(
        &self,
        prompt: &ConfirmationPrompt,
    ) -> Result<ConfirmationDecision, ApprovalError> {
        let message = prompt.message.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut stderr = std::io::stderr();
            read_decision(&mut input, &mut stderr, &message)
        })
        .await
        .map_err(|err| ApprovalError::Failed(err.to_string()))?;
        answer.map_err(|err| ApprovalError::Failed(err.to_string()))
    }
}
