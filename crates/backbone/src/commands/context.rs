//! Request context handed to command handlers.

use std::fmt::Display;
use std::str::FromStr;

use crate::world::World;

use super::CommandError;

/// Parsed request plus the backing state a handler may touch.
pub struct CommandContext<'a> {
    command: &'a str,
    args: &'a [&'a str],
    world: &'a World,
}

impl<'a> CommandContext<'a> {
    pub fn new(command: &'a str, args: &'a [&'a str], world: &'a World) -> Self {
        Self {
            command,
            args,
            world,
        }
    }

    /// Normalised (lowercase) command name.
    pub fn command(&self) -> &str {
        self.command
    }

    /// Raw argument tokens, excluding the command name.
    pub fn args(&self) -> &[&'a str] {
        self.args
    }

    pub fn world(&self) -> &World {
        self.world
    }

    /// Parses argument `index` as `T`.
    ///
    /// `context` names the argument in error messages, e.g. `"chunk x"`.
    pub fn parse_arg<T>(&self, index: usize, context: &'static str) -> Result<T, CommandError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self
            .args
            .get(index)
            .ok_or(CommandError::MissingArgument(context))?;
        value
            .parse::<T>()
            .map_err(|source| CommandError::InvalidArgument {
                value: value.to_string(),
                context,
                reason: source.to_string(),
            })
    }
}
