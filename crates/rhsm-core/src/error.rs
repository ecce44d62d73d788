//! Error types for rhsm-core
//!
//! Two layers live here. [`RunError`] is what a context reports when a
//! command could not be run or exited non-zero. [`TerminalError`] is the
//! only error that leaves this crate: a message plus a details map that
//! always carries a remediation `hint`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure categories surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The tool could not be started at all
    Execution,
    /// The tool ran and exited non-zero
    Command,
    /// The tool succeeded but its output had an unexpected shape
    Parse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Execution => "execution failure",
            FailureKind::Command => "command failure",
            FailureKind::Parse => "parse failure",
        };
        f.write_str(name)
    }
}

/// Fatal, user-facing error carrying a message and remediation details.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct TerminalError {
    /// Which kind of failure produced this error
    pub kind: FailureKind,
    /// Human-readable summary, surfaced verbatim
    pub message: String,
    /// Diagnostic details (`hint`, `stderr`, `details`, ...)
    pub details: BTreeMap<String, String>,
}

impl TerminalError {
    /// Key of the remediation hint inside `details`
    pub const HINT: &'static str = "hint";
    /// Key of the captured standard error inside `details`
    pub const STDERR: &'static str = "stderr";
    /// Key of the free-form diagnostic text inside `details`
    pub const DETAILS: &'static str = "details";

    /// Create an error with an empty details map
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        TerminalError {
            kind,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Add (or replace) a detail entry
    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Set the remediation hint
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        self.with_detail(Self::HINT, hint)
    }

    /// Look up a detail entry
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    /// Remediation hint, if any
    pub fn hint(&self) -> Option<&str> {
        self.detail(Self::HINT)
    }

    /// Captured standard error of the failed command, if any
    pub fn stderr(&self) -> Option<&str> {
        self.detail(Self::STDERR)
    }
}

/// Errors reported by an isolation context when running a command
#[derive(Error, Debug)]
pub enum RunError {
    /// The process could not be spawned (missing binary, permissions)
    #[error("failed to execute {program}: {source}")]
    Launch {
        /// First element of the argument vector
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero status
    #[error("command {args:?} exited with status {exit_code}")]
    NonZero {
        /// Full argument vector
        args: Vec<String>,
        /// Exit status (-1 when killed by a signal)
        exit_code: i32,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },
}
