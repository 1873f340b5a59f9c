//! Text command protocol.
//!
//! A request is a single ASCII line of whitespace-separated tokens; the first
//! token names a [`Command`] in the [`CommandRegistry`]. The [`Dispatcher`]
//! validates the argument count, runs the handler with a [`CommandContext`]
//! and returns the handler's raw bytes.
//!
//! # Error Handling
//!
//! - Unknown names and malformed arguments are validation failures
//! - Handler errors and handler panics are execution failures
//! - Neither kind ever takes the dispatcher down

mod builtin;
mod context;
mod dispatcher;
mod errors;
mod registry;

pub use builtin::{ChunkCommand, PingCommand};
pub use context::CommandContext;
pub use dispatcher::Dispatcher;
pub use errors::{CommandError, DispatchError};
pub use registry::CommandRegistry;

/// A named operation invocable over the command protocol.
///
/// Implementations are registered once and then shared across threads, so
/// they must be `Send + Sync` and keep any mutable state behind the
/// [`World`](crate::world::World) or their own synchronisation.
pub trait Command: Send + Sync {
    /// Command name as typed on the wire. Matched case-insensitively.
    fn name(&self) -> &'static str;

    /// Exact number of arguments the command accepts.
    fn arity(&self) -> usize;

    /// Usage string shown in argument-count errors.
    fn usage(&self) -> &'static str {
        self.name()
    }

    /// Runs the command.
    ///
    /// Return [`CommandError::MissingArgument`] or
    /// [`CommandError::InvalidArgument`] for bad input and
    /// [`CommandError::Execution`] for failures of the handler itself.
    fn execute(&self, ctx: &CommandContext<'_>) -> Result<Vec<u8>, CommandError>;
}
