//! Built-in commands registered by [`CommandRegistry::with_builtins`](super::CommandRegistry::with_builtins).

use tracing::trace;

use crate::world::{self, ChunkCoord};

use super::{Command, CommandContext, CommandError};

/// `chunk <x> <y>`: returns the encoded chunk at `(x, y)`.
///
/// Missing chunks are generated and stored in the world before encoding, so
/// this command mutates world storage on first access.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkCommand;

impl Command for ChunkCommand {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn arity(&self) -> usize {
        2
    }

    fn usage(&self) -> &'static str {
        "chunk <x> <y>"
    }

    fn execute(&self, ctx: &CommandContext<'_>) -> Result<Vec<u8>, CommandError> {
        let x = ctx.parse_arg::<i32>(0, "chunk x")?;
        let y = ctx.parse_arg::<i32>(1, "chunk y")?;
        let coord = ChunkCoord::new(x, y);

        let chunk = ctx.world().get_or_generate(coord);
        trace!(target: "backbone::commands", %coord, "Encoding chunk");
        Ok(world::encode(&chunk))
    }
}

/// `ping`: liveness probe answering `pong`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingCommand;

impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn arity(&self) -> usize {
        0
    }

    fn execute(&self, _ctx: &CommandContext<'_>) -> Result<Vec<u8>, CommandError> {
        Ok(b"pong".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ENCODED_LEN, FlatGenerator, World};

    #[test]
    fn test_chunk_generates_and_encodes() {
        let world = World::new(FlatGenerator { block: 5 });
        let args = ["3", "-4"];
        let ctx = CommandContext::new("chunk", &args, &world);

        let bytes = ChunkCommand.execute(&ctx).unwrap();
        assert_eq!(bytes.len(), ENCODED_LEN);

        let chunk = world::decode(&bytes).unwrap();
        assert_eq!(chunk.coord(), ChunkCoord::new(3, -4));
        assert!(chunk.blocks().iter().all(|&b| b == 5));
        assert!(world.contains(ChunkCoord::new(3, -4)));
    }

    #[test]
    fn test_chunk_rejects_non_integer() {
        let world = World::default();
        let args = ["abc", "1"];
        let ctx = CommandContext::new("chunk", &args, &world);

        let err = ChunkCommand.execute(&ctx).unwrap_err();
        assert!(err.is_validation());
        assert!(world.is_empty());
    }

    #[test]
    fn test_ping() {
        let world = World::default();
        let ctx = CommandContext::new("ping", &[], &world);
        assert_eq!(PingCommand.execute(&ctx).unwrap(), b"pong");
    }
}
