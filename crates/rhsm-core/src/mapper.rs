//! Translation of command failures into terminal errors
//!
//! Every command this crate issues goes through an [`ErrorMapper`]. A
//! launch failure becomes an execution failure, a non-zero exit becomes a
//! command failure; both are logged at error level and carry a hint.

use crate::context::{CommandOutput, IsolatedActions};
use crate::error::{FailureKind, RunError, TerminalError};
use crate::Result;
use tracing::error;

/// Hint attached to failed subscription-manager commands by default
pub const DEFAULT_COMMAND_HINT: &str =
    "Please ensure you have a valid RHEL subscription and your network is up.";

/// Classifies the failures of one tool's invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMapper<'a> {
    tool: &'a str,
    failure_message: &'a str,
    hint: &'a str,
}

impl<'a> ErrorMapper<'a> {
    /// Create a mapper for `tool` with the message used on non-zero exit
    pub const fn new(tool: &'a str, failure_message: &'a str) -> Self {
        ErrorMapper {
            tool,
            failure_message,
            hint: DEFAULT_COMMAND_HINT,
        }
    }

    /// Mapper for subscription-manager calls
    pub const fn subscription_manager() -> Self {
        Self::new(
            "subscription-manager",
            "A subscription-manager command failed to execute",
        )
    }

    /// Replace the hint attached to command failures
    pub const fn with_hint(mut self, hint: &'a str) -> Self {
        self.hint = hint;
        self
    }

    /// Translate a run error into a terminal error, logging it
    pub fn map(&self, err: RunError) -> TerminalError {
        let details = err.to_string();
        match err {
            RunError::Launch { source, .. } => {
                error!(tool = %self.tool, error = %source, "Failed to execute {} executable", self.tool);
                TerminalError::new(
                    FailureKind::Execution,
                    format!("Unable to execute {} executable: {}", self.tool, source),
                )
                .with_hint(format!(
                    "Please ensure {} is installed and executable.",
                    self.tool
                ))
            }
            RunError::NonZero { stderr, .. } => {
                error!(tool = %self.tool, %details, "{}", self.failure_message);
                TerminalError::new(FailureKind::Command, self.failure_message)
                    .with_detail(TerminalError::DETAILS, details)
                    .with_detail(TerminalError::STDERR, stderr)
                    .with_hint(self.hint)
            }
        }
    }

    /// Run `args` in `context`, passing success through unchanged
    pub fn call(&self, context: &dyn IsolatedActions, args: &[&str]) -> Result<CommandOutput> {
        context.call(args).map_err(|err| self.map(err))
    }
}
