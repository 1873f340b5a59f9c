//! Name-keyed command registry.
//!
//! The registry is populated once at startup and then shared read-only
//! behind an `Arc` by every [`Dispatcher`](super::Dispatcher), so lookups need
//! no locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ChunkCommand, Command, PingCommand};

/// Registry mapping command names to their handlers.
///
/// Names are stored lowercase; lookups are case-insensitive.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in commands (`chunk`, `ping`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ChunkCommand);
        registry.register(PingCommand);
        registry
    }

    /// Registers a command under its name.
    ///
    /// A command registered under an existing name replaces the previous
    /// entry (last registration wins). The replaced command is returned and
    /// the overwrite is logged.
    pub fn register(&mut self, command: impl Command + 'static) -> Option<Arc<dyn Command>> {
        self.register_arc(Arc::new(command))
    }

    /// Registers an already shared command.
    pub fn register_arc(&mut self, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        let name = command.name().to_ascii_lowercase();
        let previous = self.commands.insert(name.clone(), command);

        if previous.is_some() {
            warn!(
                target: "backbone::commands",
                command = %name,
                "Command registered twice, replacing previous handler"
            );
        } else {
            debug!(target: "backbone::commands", command = %name, "Command registered");
        }

        previous
    }

    /// Finds a command by (case-insensitive) name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.get(&name.to_ascii_lowercase())
    }

    /// Check if a command is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns an iterator over registered command names (for debugging).
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.keys().map(String::as_str)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
