//! Error types for command handlers and the dispatcher.
//!
//! Handlers report [`CommandError`]; the dispatcher folds those into
//! [`DispatchError`], keeping validation failures apart from execution
//! failures so callers can answer "bad request" and "server fault"
//! differently.

use thiserror::Error;

/// Failure reported by a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid value '{value}' for {context}: {reason}")]
    InvalidArgument {
        value: String,
        context: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Execution(String),
}

impl CommandError {
    /// Shorthand for an execution failure.
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution(reason.into())
    }

    /// Returns true if the failure was caused by the request rather than the
    /// handler.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Execution(_))
    }
}

/// Failure returned by [`Dispatcher::dispatch`](super::Dispatcher::dispatch).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("command '{command}' failed: {reason}")]
    Execution { command: String, reason: String },
}

impl DispatchError {
    /// Returns true for failures caused by a malformed request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::UnknownCommand(_) | Self::InvalidArguments { .. }
        )
    }

    pub(crate) fn from_handler(command: &str, error: CommandError) -> Self {
        let command = command.to_string();
        let reason = error.to_string();
        if error.is_validation() {
            Self::InvalidArguments { command, reason }
        } else {
            Self::Execution { command, reason }
        }
    }
}
