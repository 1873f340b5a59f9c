//! Turns request lines into command executions.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::utils::catch_panic;
use crate::world::World;

use super::{CommandContext, CommandRegistry, DispatchError};

/// Executes request lines against a shared [`CommandRegistry`].
///
/// Cheap to clone; every clone shares the same registry and world.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    world: World,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, world: World) -> Self {
        Self {
            registry: Arc::new(registry),
            world,
        }
    }

    /// Dispatcher with the built-in commands.
    pub fn with_builtins(world: World) -> Self {
        Self::new(CommandRegistry::with_builtins(), world)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Parses and executes a single request line.
    ///
    /// The line is split on ASCII whitespace; the first token names the
    /// command. Arguments cannot contain whitespace.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Empty`] for a blank line
    /// - [`DispatchError::UnknownCommand`] if no command matches
    /// - [`DispatchError::InvalidArguments`] for a wrong argument count or
    ///   unparsable arguments
    /// - [`DispatchError::Execution`] if the handler fails or panics
    pub fn dispatch(&self, line: &str) -> Result<Vec<u8>, DispatchError> {
        let mut tokens = line.split_ascii_whitespace();
        let name = tokens
            .next()
            .map(str::to_ascii_lowercase)
            .ok_or(DispatchError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        let command = self
            .registry
            .get(&name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.clone()))?;

        if args.len() != command.arity() {
            let err = DispatchError::InvalidArguments {
                command: name.clone(),
                reason: format!(
                    "expected {} argument(s), got {} (usage: {})",
                    command.arity(),
                    args.len(),
                    command.usage()
                ),
            };
            debug!(target: "backbone::commands", command = %name, error = %err, "Rejected request");
            return Err(err);
        }

        let ctx = CommandContext::new(&name, &args, &self.world);
        let result = match catch_panic(|| command.execute(&ctx)) {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(error)) => Err(DispatchError::from_handler(&name, error)),
            Err(panic) => Err(DispatchError::Execution {
                command: name.clone(),
                reason: format!("handler panicked: {panic}"),
            }),
        };

        match &result {
            Ok(bytes) => {
                debug!(target: "backbone::commands", command = %name, bytes = bytes.len(), "Command executed")
            }
            Err(err) if err.is_validation() => {
                debug!(target: "backbone::commands", command = %name, error = %err, "Rejected request")
            }
            Err(err) => {
                warn!(target: "backbone::commands", command = %name, error = %err, "Command failed")
            }
        }

        result
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.registry.len())
            .field("world", &self.world)
            .finish()
    }
}
